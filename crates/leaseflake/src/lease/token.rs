use core::fmt;

/// Opaque proof of lease ownership.
///
/// A fresh random token is minted for every acquisition, so a process that
/// loses its lease and later sees the same worker id reissued can tell the
/// new holder apart from itself.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct OwnerToken(u128);

impl OwnerToken {
    /// Mints a new random token.
    pub fn generate() -> Self {
        Self(rand::random())
    }

    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn to_raw(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

// Only a prefix is shown so tokens don't end up in logs wholesale.
impl fmt::Debug for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerToken({:08x}..)", (self.0 >> 96) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_differ() {
        assert_ne!(OwnerToken::generate(), OwnerToken::generate());
    }

    #[test]
    fn display_is_fixed_width_hex() {
        let token = OwnerToken::from_raw(0xabc);
        assert_eq!(token.to_string().len(), 32);
        assert!(token.to_string().ends_with("abc"));
    }
}
