/// The store's answer to a write.
///
/// A write that was not acknowledged carries the store's reason, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteAck {
    acknowledged: bool,
    n: u64,
    error: Option<String>,
}

impl WriteAck {
    /// An acknowledged write that affected `n` documents.
    pub fn acknowledged(n: u64) -> Self {
        WriteAck {
            acknowledged: true,
            n,
            error: None,
        }
    }

    pub fn unacknowledged(error: Option<&str>) -> Self {
        WriteAck {
            acknowledged: false,
            n: 0,
            error: error.map(|e| e.to_string()),
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
