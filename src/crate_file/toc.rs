//! Bootstrap header and table of contents.

use super::format::*;
use super::stream::StreamReader;
use crate::util::{DecodeConfig, Diagnostics, Error, MemoryBudget, Result};

/// Read the 88-byte bootstrap at position 0.
///
/// Returns the file version and the TOC offset. The reader is left just
/// past the bootstrap.
pub fn read_bootstrap(r: &mut StreamReader<'_>) -> Result<(CrateVersion, u64)> {
    if r.size() < BOOTSTRAP_SIZE as u64 {
        return Err(Error::header(format!(
            "file of {} bytes is smaller than the {BOOTSTRAP_SIZE}-byte bootstrap",
            r.size()
        )));
    }
    r.seek(0)?;

    let magic = r.read_bytes(CRATE_MAGIC.len() as u64)?;
    if magic != CRATE_MAGIC {
        return Err(Error::header(format!(
            "bad magic {:?}",
            String::from_utf8_lossy(magic)
        )));
    }

    let version = r.read_bytes(8)?;
    let version = CrateVersion::new(version[0], version[1], version[2]);
    if !version.is_supported() {
        return Err(Error::UnsupportedVersion {
            major: version.major,
            minor: version.minor,
            patch: version.patch,
        });
    }

    let toc_offset = r.read_i64()?;
    if toc_offset < BOOTSTRAP_SIZE as i64 || toc_offset as u64 >= r.size() {
        return Err(Error::header(format!(
            "TOC offset {toc_offset} outside [{BOOTSTRAP_SIZE}, {})",
            r.size()
        )));
    }

    // reserved
    r.read_bytes(64)?;

    tracing::debug!(%version, toc_offset, "read bootstrap");
    Ok((version, toc_offset as u64))
}

fn section_name(raw: &[u8]) -> Result<String> {
    let len = raw
        .iter()
        .position(|&b| b == 0)
        .filter(|&n| n <= SECTION_NAME_MAX_LENGTH)
        .ok_or_else(|| Error::SectionBounds("section name is not NUL terminated".into()))?;
    Ok(String::from_utf8_lossy(&raw[..len]).into_owned())
}

/// Read the section directory at `toc_offset`.
pub fn read_toc(
    r: &mut StreamReader<'_>,
    toc_offset: u64,
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
    diag: &mut Diagnostics,
) -> Result<TableOfContents> {
    r.seek(toc_offset)?;

    let count = r.read_u64()?;
    let count = budget.allocate::<Section>("TOC sections", count, config.max_toc_sections)?;

    let mut toc = TableOfContents {
        sections: Vec::with_capacity(count),
        ..Default::default()
    };

    for i in 0..count {
        let name = section_name(r.read_bytes(SECTION_NAME_MAX_LENGTH as u64 + 1)?)?;
        let start = r.read_i64()?;
        let size = r.read_i64()?;

        let end = start.checked_add(size);
        if start < 0 || size < 0 || end.map_or(true, |e| e as u64 > r.size()) {
            return Err(Error::SectionBounds(format!(
                "section '{name}' [{start}, +{size}) outside file of {} bytes",
                r.size()
            )));
        }

        match toc.slot_mut(&name) {
            Some(slot) if slot.is_some() => {
                return Err(Error::SectionBounds(format!("duplicate section '{name}'")));
            }
            Some(slot) => *slot = Some(i),
            None => diag.warn(format!("unknown section '{name}' ignored")),
        }
        tracing::trace!(%name, start, size, "section");
        toc.sections.push(Section { name, start, size });
    }

    tracing::debug!(sections = toc.sections.len(), "read TOC");
    Ok(toc)
}

/// Look up a known section, failing if the file lacks it.
pub fn require_section<'t>(toc: &'t TableOfContents, name: &str) -> Result<&'t Section> {
    toc.section(name)
        .ok_or_else(|| Error::SectionBounds(format!("missing section '{name}'")))
}
