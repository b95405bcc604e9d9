///
/// InvocationContext
///
/// Per-operation context, read-only from the marshalling layer's
/// perspective. `origin_local` is true when the operation was initiated on
/// this process, false when it was received from a peer.
///

#[derive(Clone, Debug)]
pub struct InvocationContext {
    origin_local: bool,
    originator: Option<String>,
}

impl InvocationContext {
    #[must_use]
    pub const fn local() -> Self {
        Self {
            origin_local: true,
            originator: None,
        }
    }

    #[must_use]
    pub fn remote(originator: impl Into<String>) -> Self {
        Self {
            origin_local: false,
            originator: Some(originator.into()),
        }
    }

    #[must_use]
    pub const fn is_origin_local(&self) -> bool {
        self.origin_local
    }

    #[must_use]
    pub fn originator(&self) -> Option<&str> {
        self.originator.as_deref()
    }
}

///
/// TESTS
///
