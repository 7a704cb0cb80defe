//! Test-only writer for small but valid Crate files.

#![allow(dead_code)]

use usdcrate::core::compression::compress_to_buffer;
use usdcrate::core::integer_coding::{compress_i32, compress_u32};
use usdcrate::crate_file::ValueRep;
use usdcrate::util::ValueType;

pub fn inline(ty: ValueType, payload: u64) -> ValueRep {
    ValueRep::new(ty as u8, false, true, false, payload)
}

pub fn at(ty: ValueType, offset: u64) -> ValueRep {
    ValueRep::new(ty as u8, false, false, false, offset)
}

pub fn array_at(ty: ValueType, offset: u64, compressed: bool) -> ValueRep {
    ValueRep::new(ty as u8, true, false, compressed, offset)
}

/// Assembles tables and value data, then lays them out as
/// bootstrap, value data, sections, TOC.
pub struct CrateBuilder {
    pub version: [u8; 3],
    pub tokens: Vec<String>,
    pub strings: Vec<u32>,
    pub fields: Vec<(u32, ValueRep)>,
    pub fieldsets: Vec<u32>,
    pub num_paths: Option<u64>,
    pub path_indexes: Vec<u32>,
    pub element_tokens: Vec<i32>,
    pub jumps: Vec<i32>,
    pub specs: Vec<(u32, u32, u32)>,
    pub extra_sections: Vec<(String, Vec<u8>)>,
    data: Vec<u8>,
}

impl Default for CrateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CrateBuilder {
    pub const DATA_START: u64 = 88;

    pub fn new() -> Self {
        Self {
            version: [0, 8, 0],
            tokens: Vec::new(),
            strings: Vec::new(),
            fields: Vec::new(),
            fieldsets: Vec::new(),
            num_paths: None,
            path_indexes: Vec::new(),
            element_tokens: Vec::new(),
            jumps: Vec::new(),
            specs: Vec::new(),
            extra_sections: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Intern a token, returning its index.
    pub fn token(&mut self, s: &str) -> u32 {
        if let Some(i) = self.tokens.iter().position(|t| t == s) {
            return i as u32;
        }
        self.tokens.push(s.to_string());
        (self.tokens.len() - 1) as u32
    }

    /// Add a string entry, returning its string index.
    pub fn string(&mut self, s: &str) -> u32 {
        let t = self.token(s);
        if let Some(i) = self.strings.iter().position(|x| *x == t) {
            return i as u32;
        }
        self.strings.push(t);
        (self.strings.len() - 1) as u32
    }

    /// Add a field, returning its field index.
    pub fn field(&mut self, name: &str, rep: ValueRep) -> u32 {
        let t = self.token(name);
        self.fields.push((t, rep));
        (self.fields.len() - 1) as u32
    }

    /// Add a terminated fieldset group, returning its start index.
    pub fn fieldset(&mut self, fields: &[u32]) -> u32 {
        let start = self.fieldsets.len() as u32;
        self.fieldsets.extend_from_slice(fields);
        self.fieldsets.push(u32::MAX);
        start
    }

    pub fn spec(&mut self, path: u32, fieldset: u32, spec_type: u32) {
        self.specs.push((path, fieldset, spec_type));
    }

    pub fn path_tree(&mut self, path_indexes: &[u32], element_tokens: &[i32], jumps: &[i32]) {
        self.path_indexes = path_indexes.to_vec();
        self.element_tokens = element_tokens.to_vec();
        self.jumps = jumps.to_vec();
    }

    /// Absolute offset the next value data will land at.
    pub fn next_offset(&self) -> u64 {
        Self::DATA_START + self.data.len() as u64
    }

    /// Append raw value data, returning its absolute offset.
    pub fn push_data(&mut self, bytes: &[u8]) -> u64 {
        let offset = self.next_offset();
        self.data.extend_from_slice(bytes);
        offset
    }

    fn array_count(&self, n: usize) -> Vec<u8> {
        if (self.version[0], self.version[1]) >= (0, 7) {
            (n as u64).to_le_bytes().to_vec()
        } else {
            (n as u32).to_le_bytes().to_vec()
        }
    }

    pub fn push_f32_array(&mut self, values: &[f32]) -> u64 {
        let mut bytes = self.array_count(values.len());
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.push_data(&bytes)
    }

    pub fn push_f64_array(&mut self, values: &[f64]) -> u64 {
        let mut bytes = self.array_count(values.len());
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.push_data(&bytes)
    }

    pub fn push_vec3f_array(&mut self, values: &[[f32; 3]]) -> u64 {
        let mut bytes = self.array_count(values.len());
        for v in values.iter().flatten() {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.push_data(&bytes)
    }

    /// Integer-coded int array, as written for counts of 16 and up.
    pub fn push_compressed_i32_array(&mut self, values: &[i32]) -> u64 {
        let packed = compress_i32(values).unwrap();
        let mut bytes = self.array_count(values.len());
        bytes.extend_from_slice(&(packed.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&packed);
        self.push_data(&bytes)
    }

    /// Path tree used by most tests:
    /// `/`, `/World`, `/World/Mesh`, `/World/Mesh.points`, `/World/Cam`, `/Light`.
    pub fn sample_paths(&mut self) {
        for t in ["", "World", "Mesh", "points", "Cam", "Light"] {
            self.token(t);
        }
        self.path_tree(&[0, 1, 2, 3, 4, 5], &[0, 1, 2, -3, 4, 5], &[-1, 4, 2, -2, -2, -2]);
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = b"PXR-USDC".to_vec();
        out.extend_from_slice(&self.version);
        out.extend_from_slice(&[0; 5]);
        out.extend_from_slice(&0i64.to_le_bytes());
        out.resize(Self::DATA_START as usize, 0);
        out.extend_from_slice(&self.data);

        let mut sections = vec![
            ("TOKENS".to_string(), self.tokens_section()),
            ("STRINGS".to_string(), self.strings_section()),
            ("FIELDS".to_string(), self.fields_section()),
            ("FIELDSETS".to_string(), self.fieldsets_section()),
            ("PATHS".to_string(), self.paths_section()),
            ("SPECS".to_string(), self.specs_section()),
        ];
        sections.extend(self.extra_sections.iter().cloned());

        let mut records = Vec::new();
        for (name, bytes) in &sections {
            records.push((name.clone(), out.len() as i64, bytes.len() as i64));
            out.extend_from_slice(bytes);
        }

        let toc_offset = out.len() as i64;
        out.extend_from_slice(&(records.len() as u64).to_le_bytes());
        for (name, start, size) in records {
            let mut raw = [0u8; 16];
            raw[..name.len()].copy_from_slice(name.as_bytes());
            out.extend_from_slice(&raw);
            out.extend_from_slice(&start.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
        }
        out[16..24].copy_from_slice(&toc_offset.to_le_bytes());
        out
    }

    fn tokens_section(&self) -> Vec<u8> {
        let mut blob = Vec::new();
        for t in &self.tokens {
            blob.extend_from_slice(t.as_bytes());
            blob.push(0);
        }
        let packed = compress_to_buffer(&blob).unwrap();
        let mut out = (self.tokens.len() as u64).to_le_bytes().to_vec();
        out.extend_from_slice(&(blob.len() as u64).to_le_bytes());
        out.extend_from_slice(&(packed.len() as u64).to_le_bytes());
        out.extend_from_slice(&packed);
        out
    }

    fn strings_section(&self) -> Vec<u8> {
        let mut out = (self.strings.len() as u64).to_le_bytes().to_vec();
        for s in &self.strings {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    fn fields_section(&self) -> Vec<u8> {
        let mut out = (self.fields.len() as u64).to_le_bytes().to_vec();
        let tokens: Vec<u32> = self.fields.iter().map(|(t, _)| *t).collect();
        push_u32s(&mut out, &tokens);
        let mut reps = Vec::new();
        for (_, rep) in &self.fields {
            reps.extend_from_slice(&rep.0.to_le_bytes());
        }
        let packed = compress_to_buffer(&reps).unwrap();
        out.extend_from_slice(&(packed.len() as u64).to_le_bytes());
        out.extend_from_slice(&packed);
        out
    }

    fn fieldsets_section(&self) -> Vec<u8> {
        let mut out = (self.fieldsets.len() as u64).to_le_bytes().to_vec();
        push_u32s(&mut out, &self.fieldsets);
        out
    }

    fn paths_section(&self) -> Vec<u8> {
        let num_paths = self.num_paths.unwrap_or(self.path_indexes.len() as u64);
        let mut out = num_paths.to_le_bytes().to_vec();
        out.extend_from_slice(&(self.path_indexes.len() as u64).to_le_bytes());
        push_u32s(&mut out, &self.path_indexes);
        push_i32s(&mut out, &self.element_tokens);
        push_i32s(&mut out, &self.jumps);
        out
    }

    fn specs_section(&self) -> Vec<u8> {
        let mut out = (self.specs.len() as u64).to_le_bytes().to_vec();
        let paths: Vec<u32> = self.specs.iter().map(|s| s.0).collect();
        let fieldsets: Vec<u32> = self.specs.iter().map(|s| s.1).collect();
        let types: Vec<u32> = self.specs.iter().map(|s| s.2).collect();
        push_u32s(&mut out, &paths);
        push_u32s(&mut out, &fieldsets);
        push_u32s(&mut out, &types);
        out
    }
}

fn push_u32s(out: &mut Vec<u8>, values: &[u32]) {
    let packed = compress_u32(values).unwrap();
    out.extend_from_slice(&(packed.len() as u64).to_le_bytes());
    out.extend_from_slice(&packed);
}

fn push_i32s(out: &mut Vec<u8>, values: &[i32]) {
    let packed = compress_i32(values).unwrap();
    out.extend_from_slice(&(packed.len() as u64).to_le_bytes());
    out.extend_from_slice(&packed);
}
