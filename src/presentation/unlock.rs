//! # Secure-Area Unlock
//!
//! Drives repeated signing attempts against a credential's key, resolving
//! locked-key conditions through the biometric and passphrase prompt
//! surfaces until the attempt succeeds, a fatal condition is reached, or the
//! bounded passphrase attempt count is exhausted.

use crate::error::{Error, Result};
use crate::provider::{
    BiometricPrompt, KeyProfile, KeyUnlock, LockReason, PassphrasePrompt, SecureArea, SignError,
};

/// Maximum number of passphrase prompts for a single presentation. The
/// counter is shared across the whole unlock loop, including switches
/// between retry types.
pub const MAX_PASSPHRASE_ATTEMPTS: u32 = 3;

/// Retry `attempt` until it produces bytes, resolving each locked-key
/// condition by the capability of the key holder. Strictly sequential: a
/// single unlock attempt is in flight at a time.
pub(crate) async fn unlock_and_sign<A, P, F>(
    secure_area: &A, prompts: &P, alias: &str, mut attempt: F,
) -> Result<Vec<u8>>
where
    A: SecureArea,
    P: BiometricPrompt + PassphrasePrompt,
    F: FnMut(Option<&KeyUnlock>) -> Result<Vec<u8>, SignError>,
{
    let mut unlock: Option<KeyUnlock> = None;
    let mut remaining_passphrase_attempts = MAX_PASSPHRASE_ATTEMPTS;

    loop {
        let reason = match attempt(unlock.as_ref()) {
            Ok(bytes) => return Ok(bytes),
            Err(SignError::Other(e)) => return Err(Error::Other(e)),
            Err(SignError::Locked(reason)) => reason,
        };
        tracing::debug!("signing attempt found key locked: {reason:?}");

        match secure_area.profile(alias)? {
            KeyProfile::Keystore => {
                let handle = secure_area.signing_handle(alias)?;
                if !prompts.authenticate(&handle).await {
                    return Err(Error::AuthFailed("biometric unsuccessful".to_string()));
                }
                unlock = Some(KeyUnlock::Biometric(handle));
            }

            KeyProfile::Software { constraints } => {
                if remaining_passphrase_attempts == 0 {
                    return Err(Error::AttemptsExhausted);
                }
                remaining_passphrase_attempts -= 1;

                let Some(passphrase) = prompts.passphrase(&constraints).await else {
                    return Err(Error::UserCancelled);
                };
                unlock = Some(KeyUnlock::Passphrase(passphrase));
            }

            KeyProfile::Cloud { constraints } => {
                // The unlock stays scoped to one remote challenge token for
                // the whole loop.
                let (token, passphrase) = match unlock.take() {
                    Some(KeyUnlock::Cloud { token, passphrase }) => (token, passphrase),
                    _ => (secure_area.cloud_token(alias)?, None),
                };

                match reason {
                    LockReason::WrongPassphrase | LockReason::PassphraseRequired => {
                        if remaining_passphrase_attempts == 0 {
                            return Err(Error::AttemptsExhausted);
                        }
                        remaining_passphrase_attempts -= 1;

                        let Some(passphrase) = prompts.passphrase(&constraints).await else {
                            return Err(Error::UserCancelled);
                        };
                        unlock = Some(KeyUnlock::Cloud { token, passphrase: Some(passphrase) });
                    }

                    LockReason::UserNotAuthenticated | LockReason::UserAuthRequired => {
                        let handle = crate::provider::CryptoHandle(token.clone());
                        if !prompts.authenticate(&handle).await {
                            return Err(Error::AuthFailed("biometric unsuccessful".to_string()));
                        }
                        unlock = Some(KeyUnlock::Cloud { token, passphrase });
                    }
                }
            }

            KeyProfile::Other(name) => {
                return Err(Error::NotImplemented(format!(
                    "no unlock handling for secure area {name}"
                )));
            }
        }
    }
}
