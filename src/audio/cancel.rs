use tokio_util::sync::CancellationToken;

/// A cancellation token that may be absent.
///
/// Firing an empty slot, or one whose token is already cancelled, is a no-op.
#[derive(Debug, Default)]
pub struct CancelSlot(Option<CancellationToken>);

impl CancelSlot {
    pub fn arm(&mut self, token: CancellationToken) {
        self.0 = Some(token);
    }

    pub fn is_armed(&self) -> bool {
        self.0.is_some()
    }

    /// Armed and not yet fired.
    pub fn is_live(&self) -> bool {
        self.0.as_ref().is_some_and(|token| !token.is_cancelled())
    }

    pub fn fire(&self) {
        if let Some(token) = &self.0 {
            token.cancel();
        }
    }

    pub fn take(&mut self) -> Option<CancellationToken> {
        self.0.take()
    }
}
