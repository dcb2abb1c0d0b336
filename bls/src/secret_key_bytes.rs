use core::fmt;

use derive_more::{AsMut, AsRef, From};

pub const SIZE: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Default, AsRef, AsMut, From)]
#[as_ref(forward)]
#[as_mut(forward)]
pub struct SecretKeyBytes {
    pub(crate) bytes: [u8; SIZE],
}

// Secret keys must never end up in logs or error messages.
impl fmt::Debug for SecretKeyBytes {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("[REDACTED]")
    }
}
