//! Unit of work spanning paymaster storage and the host.

use crate::error::PaymasterError;
use crate::host::Host;
use crate::paymaster::Paymaster;

/// Runs `f` so that either all of its effects land or none do.
///
/// On `Err` both the paymaster and the host are rolled back to where they stood before `f`
/// ran, and the error is handed back untouched.
pub fn atomically<H, T, F>(paymaster: &mut Paymaster, host: &mut H, f: F) -> Result<T, PaymasterError>
where
    H: Host + ?Sized,
    F: FnOnce(&mut Paymaster, &mut H) -> Result<T, PaymasterError>,
{
    let paymaster_checkpoint = paymaster.checkpoint();
    let host_checkpoint = host.checkpoint();

    match f(paymaster, host) {
        Ok(value) => {
            paymaster.checkpoint_commit();
            host.checkpoint_commit();
            Ok(value)
        }
        Err(err) => {
            paymaster.checkpoint_revert(paymaster_checkpoint);
            host.checkpoint_revert(host_checkpoint);
            Err(err)
        }
    }
}
