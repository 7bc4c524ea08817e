use std::fmt;

// Every session-local id is a monotonic counter wrapped in its own type.
macro_rules! define_session_id {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}-{}", $label, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self::new(value)
            }
        }
    };
}

define_session_id!(ExchangeId, "exchange");
define_session_id!(SubmissionId, "submission");
define_session_id!(PreviewId, "preview");

/// Hands out strictly increasing raw ids, starting at 1.
#[derive(Debug, Clone, Default)]
pub(crate) struct IdSequence {
    last: u64,
}

impl IdSequence {
    pub(crate) fn next<T: From<u64>>(&mut self) -> T {
        self.last = self.last.saturating_add(1);
        T::from(self.last)
    }
}
