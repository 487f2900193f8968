//! dtype stuff.
//!
//! A dtype descriptor is a short ASCII string `<endian><kind><width>`, e.g.
//! `<f8`, modeled internally as a tagged value so downstream code never has
//! to re-parse the string after the API boundary.

use std::fmt;
use std::sync::OnceLock;

use crate::error::{BigFileError, Result};
use crate::here;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    fn as_char(self) -> char {
        match self {
            Endian::Little => '<',
            Endian::Big => '>',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Int,
    Uint,
    Float,
}

impl Kind {
    fn as_char(self) -> char {
        match self {
            Kind::Int => 'i',
            Kind::Uint => 'u',
            Kind::Float => 'f',
        }
    }

    fn from_char(c: char) -> Option<Kind> {
        match c {
            'i' => Some(Kind::Int),
            'u' => Some(Kind::Uint),
            'f' => Some(Kind::Float),
            _ => None,
        }
    }
}

/// Normalized `{ endian, kind, width }` triple. The on-disk/wire form is
/// always the 3-char ASCII string produced by `Display`/`to_string()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dtype {
    pub endian: Endian,
    pub kind: Kind,
    pub width: u8,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.endian.as_char(), self.kind.as_char(), self.width)
    }
}

fn native_endian() -> Endian {
    static NATIVE: OnceLock<Endian> = OnceLock::new();
    *NATIVE.get_or_init(|| {
        let probe: u32 = 0x0123_4567;
        if probe.to_le_bytes()[0] == probe.to_ne_bytes()[0] {
            Endian::Little
        } else {
            Endian::Big
        }
    })
}

impl Dtype {
    /// Parse and normalize a dtype string per spec.md §3: if the first
    /// character is not an endian marker, native endian is prepended; `=`
    /// is then resolved to the runtime-detected native marker. The
    /// canonical form always carries an explicit `<` or `>`.
    pub fn normalize(src: &str) -> Result<Dtype> {
        let first = src.chars().next();

        let (endian, rest): (Endian, &str) = match first {
            Some('<') => (Endian::Little, &src[1..]),
            Some('>') => (Endian::Big, &src[1..]),
            Some('=') => (native_endian(), &src[1..]),
            _ => (native_endian(), src),
        };

        let mut rchars = rest.chars();
        let kind_char = rchars.next().ok_or_else(|| BigFileError::UnsupportedDtype {
            dtype: src.to_string(),
            loc: here!(),
        })?;
        let kind = Kind::from_char(kind_char).ok_or_else(|| BigFileError::UnsupportedDtype {
            dtype: src.to_string(),
            loc: here!(),
        })?;
        let width_str: String = rchars.collect();
        let width: u8 = width_str.trim().parse().map_err(|_| BigFileError::UnsupportedDtype {
            dtype: src.to_string(),
            loc: here!(),
        })?;
        if width != 4 && width != 8 {
            return Err(BigFileError::UnsupportedDtype {
                dtype: src.to_string(),
                loc: here!(),
            });
        }
        Ok(Dtype { endian, kind, width })
    }

    pub fn itemsize(&self) -> usize {
        self.width as usize
    }

    pub fn needs_swap(&self) -> bool {
        self.endian != native_endian()
    }

    /// Canonical on-disk string, padded/truncated to match the original's
    /// fixed 8-byte `dtype[8]` field when written into the attr file.
    pub fn to_padded8(&self) -> [u8; 8] {
        let s = self.to_string();
        let mut buf = [0u8; 8];
        let bytes = s.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
        buf
    }
}

/// Compare two dtype strings after normalization (P-style `dtype_cmp`).
pub fn cmp(a: &str, b: &str) -> Result<std::cmp::Ordering> {
    let na = Dtype::normalize(a)?;
    let nb = Dtype::normalize(b)?;
    Ok(na.cmp(&nb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_explicit_endian_roundtrips() {
        let dt = Dtype::normalize("<f8").unwrap();
        assert_eq!(dt.endian, Endian::Little);
        assert_eq!(dt.kind, Kind::Float);
        assert_eq!(dt.width, 8);
        assert_eq!(dt.to_string(), "<f8");
    }

    #[test]
    fn normalize_prepends_native_when_missing() {
        let dt = Dtype::normalize("i4").unwrap();
        assert_eq!(dt.endian, native_endian());
        assert_eq!(dt.kind, Kind::Int);
        assert_eq!(dt.width, 4);
    }

    #[test]
    fn normalize_resolves_equals_to_native() {
        let dt = Dtype::normalize("=u8").unwrap();
        assert_eq!(dt.endian, native_endian());
        assert_ne!(dt.to_string().chars().next().unwrap(), '=');
    }

    #[test]
    fn unsupported_width_is_rejected() {
        assert!(Dtype::normalize("<f2").is_err());
        assert!(Dtype::normalize("<z8").is_err());
    }

    #[test]
    fn needs_swap_reflects_foreign_endian() {
        let native = Dtype::normalize("=i4").unwrap();
        assert!(!native.needs_swap());
        let foreign = if native.endian == Endian::Little {
            Dtype::normalize(">i4").unwrap()
        } else {
            Dtype::normalize("<i4").unwrap()
        };
        assert!(foreign.needs_swap());
    }

    #[test]
    fn cmp_is_endian_and_width_sensitive() {
        assert_eq!(cmp("<f8", "<f8").unwrap(), std::cmp::Ordering::Equal);
        assert_ne!(cmp("<f8", "<f4").unwrap(), std::cmp::Ordering::Equal);
    }
}
