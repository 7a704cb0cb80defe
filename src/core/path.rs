//! Scene paths.
//!
//! A path is a prim part (`/World/Geom{lod=high}/Mesh`) plus an optional
//! property part (`points`, or `rel[/Target]`). Paths rebuilt from a Crate
//! file are always absolute.

use std::fmt;

use crate::util::{Error, Result};

/// Location in the scene hierarchy.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    prim: String,
    prop: String,
    absolute: bool,
}

impl Path {
    /// The absolute root `/`.
    pub fn absolute_root() -> Self {
        Self {
            prim: "/".to_string(),
            prop: String::new(),
            absolute: true,
        }
    }

    /// Create a path from its parts.
    pub fn new(prim: impl Into<String>, prop: impl Into<String>) -> Self {
        let prim = prim.into();
        let absolute = prim.starts_with('/');
        Self {
            prim,
            prop: prop.into(),
            absolute,
        }
    }

    /// Check if this is the empty (unset) path.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.prim.is_empty() && self.prop.is_empty()
    }

    /// Check if this is `/`.
    #[inline]
    pub fn is_absolute_root(&self) -> bool {
        self.prim == "/" && self.prop.is_empty()
    }

    /// Check if the path starts at the root.
    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Check if this names a prim (no property part).
    #[inline]
    pub fn is_prim_path(&self) -> bool {
        !self.prim.is_empty() && self.prop.is_empty()
    }

    /// Check if this names a property.
    #[inline]
    pub fn is_property_path(&self) -> bool {
        !self.prop.is_empty()
    }

    /// Prim part, e.g. `/World/Mesh`.
    #[inline]
    pub fn prim_part(&self) -> &str {
        &self.prim
    }

    /// Property part, e.g. `points`. Empty for prim paths.
    #[inline]
    pub fn prop_part(&self) -> &str {
        &self.prop
    }

    /// Append a property name.
    pub fn append_property(&self, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::invalid("empty property name"));
        }
        if self.is_property_path() {
            return Err(Error::invalid(format!(
                "cannot append property '{name}' to property path {self}"
            )));
        }
        Ok(Self {
            prim: self.prim.clone(),
            prop: name.to_string(),
            absolute: self.absolute,
        })
    }

    /// Append a prim name, a variant selection (`{set=sel}`) or, on a
    /// property path, a target (`[/Other]`).
    pub fn append_element(&self, elem: &str) -> Result<Self> {
        if elem.is_empty() {
            return Err(Error::invalid("empty path element"));
        }

        if self.is_property_path() {
            if elem.starts_with('[') && elem.ends_with(']') {
                let mut out = self.clone();
                out.prop.push_str(elem);
                return Ok(out);
            }
            return Err(Error::invalid(format!(
                "cannot append element '{elem}' to property path {self}"
            )));
        }

        let mut out = self.clone();
        if elem.starts_with('{') {
            if !elem.ends_with('}') || self.is_absolute_root() {
                return Err(Error::invalid(format!("bad variant selection '{elem}'")));
            }
            out.prim.push_str(elem);
        } else {
            if !out.prim.ends_with('/') {
                out.prim.push('/');
            }
            out.prim.push_str(elem);
        }
        Ok(out)
    }

    /// Bytes held by the path's text.
    #[inline]
    pub fn text_len(&self) -> usize {
        self.prim.len() + self.prop.len()
    }

    /// Last element: the property name, variant selection or prim name.
    pub fn name(&self) -> &str {
        if !self.prop.is_empty() {
            return &self.prop;
        }
        if self.prim == "/" {
            return &self.prim;
        }
        if self.prim.ends_with('}') {
            if let Some(i) = self.prim.rfind('{') {
                return &self.prim[i..];
            }
        }
        match self.prim.rfind('/') {
            Some(i) => &self.prim[i + 1..],
            None => &self.prim,
        }
    }

    /// Parent path, or `None` for the root and the empty path.
    pub fn parent(&self) -> Option<Self> {
        if !self.prop.is_empty() {
            return Some(Self {
                prim: self.prim.clone(),
                prop: String::new(),
                absolute: self.absolute,
            });
        }
        if self.prim.is_empty() || self.prim == "/" {
            return None;
        }
        let name_len = self.name().len();
        let mut prim = self.prim[..self.prim.len() - name_len].to_string();
        if prim.len() > 1 && prim.ends_with('/') {
            prim.pop();
        }
        if prim.is_empty() {
            return None;
        }
        Some(Self {
            prim,
            prop: String::new(),
            absolute: self.absolute,
        })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prop.is_empty() {
            write!(f, "{}", self.prim)
        } else {
            write!(f, "{}.{}", self.prim, self.prop)
        }
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root() {
        let root = Path::absolute_root();
        assert!(root.is_absolute_root());
        assert!(root.is_prim_path());
        assert_eq!(root.to_string(), "/");
        assert_eq!(root.parent(), None);
        assert!(Path::default().is_empty());
    }

    #[test]
    fn test_append() {
        let world = Path::absolute_root().append_element("World").unwrap();
        assert_eq!(world.to_string(), "/World");
        let mesh = world.append_element("Mesh").unwrap();
        assert_eq!(mesh.to_string(), "/World/Mesh");
        assert_eq!(mesh.name(), "Mesh");

        let points = mesh.append_property("points").unwrap();
        assert_eq!(points.to_string(), "/World/Mesh.points");
        assert!(points.is_property_path());
        assert_eq!(points.name(), "points");
        assert_eq!(points.text_len(), 17);
        assert_eq!(points.parent(), Some(mesh.clone()));
        assert_eq!(mesh.parent(), Some(world.clone()));
        assert_eq!(world.parent(), Some(Path::absolute_root()));
    }

    #[test]
    fn test_variant_selection() {
        let geom = Path::absolute_root().append_element("Geom").unwrap();
        let lod = geom.append_element("{lod=high}").unwrap();
        assert_eq!(lod.to_string(), "/Geom{lod=high}");
        assert_eq!(lod.name(), "{lod=high}");
        assert_eq!(lod.parent(), Some(geom.clone()));
        let child = lod.append_element("Mesh").unwrap();
        assert_eq!(child.to_string(), "/Geom{lod=high}/Mesh");
        assert!(Path::absolute_root().append_element("{a=b}").is_err());
    }

    #[test]
    fn test_property_rules() {
        let prim = Path::new("/A", "");
        let rel = prim.append_property("rel").unwrap();
        assert!(rel.append_property("again").is_err());
        assert!(rel.append_element("Child").is_err());
        let target = rel.append_element("[/B]").unwrap();
        assert_eq!(target.to_string(), "/A.rel[/B]");
    }
}
