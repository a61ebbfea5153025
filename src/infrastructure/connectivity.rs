/// Queried once per batch sync pass; when offline the whole batch is skipped.
pub trait ConnectivityCheck: Send + Sync {
    fn is_offline(&self) -> bool;
}

/// Default probe. Real offline detection needs a platform signal; until then
/// the device is assumed reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

impl ConnectivityCheck for AssumeOnline {
    fn is_offline(&self) -> bool {
        false
    }
}
