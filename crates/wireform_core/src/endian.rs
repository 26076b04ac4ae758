//! Byte order: a host-global default that individual atoms can override, propagated to any
//! sub-atoms they own via `set_byteorder`.

/// Byte order override. `Native` resolves to the host's byte order at the point it's read, same
/// as `byteorder::NativeEndian`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
    Native,
}

impl Endian {
    pub fn is_little_endian(self) -> bool {
        match self {
            Endian::Little => true,
            Endian::Big => false,
            Endian::Native => cfg!(target_endian = "little"),
        }
    }
}
