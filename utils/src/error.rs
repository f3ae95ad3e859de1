/// A result whose error case carries no payload: the reason is logged at the
/// point of failure instead of threaded through the call stack.
pub type Result<T = (), E = ()> = result::Result<T, E>;

use core::result;
