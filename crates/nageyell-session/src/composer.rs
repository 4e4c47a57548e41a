use nageyell_generator::MessageGenerator;
use nageyell_types::{status::Status, NageError};
use tracing::{debug, info};

use crate::{state::SessionHandle, status::StatusBoard};

enum Claim {
    NotNeeded,
    NoCredential,
    Ready(String, i64),
}

/// Holds the `generating` flag for one composition and releases it on drop,
/// including when the composing future is cancelled mid-generation.
struct GeneratingSlot<'a> {
    state: &'a SessionHandle,
}

impl Drop for GeneratingSlot<'_> {
    fn drop(&mut self) {
        self.state.update(|s| s.generating = false);
    }
}

/// Fills an empty message from the generator, using the scanned credential.
pub struct MessageComposer<G> {
    generator: G,
    state: SessionHandle,
    status: StatusBoard,
}

impl<G> MessageComposer<G>
where
    G: MessageGenerator,
{
    pub fn new(generator: G, state: SessionHandle, status: StatusBoard) -> Self {
        Self {
            generator,
            state,
            status,
        }
    }

    /// Generates a message when the current one is blank. Returns `true` when a
    /// generated message was stored.
    pub async fn compose_if_empty(&self) -> bool {
        // Claim the generation slot and read inputs in one critical section.
        let claim = self.state.update(|s| {
            if !s.message.trim().is_empty() || s.generating {
                return Claim::NotNeeded;
            }
            match s.credential.clone().filter(|c| !c.is_empty()) {
                Some(credential) => {
                    s.generating = true;
                    Claim::Ready(credential, s.point)
                }
                None => Claim::NoCredential,
            }
        });

        let (credential, point) = match claim {
            Claim::Ready(credential, point) => (credential, point),
            Claim::NotNeeded => return false,
            Claim::NoCredential => {
                self.status.publish(Status::CredentialMissing);
                return false;
            }
        };

        let _slot = GeneratingSlot { state: &self.state };
        info!("Generating message for score {point}");
        let result = self.generator.generate(&credential, point).await;
        match result {
            Ok(text) => {
                let stored = self.state.update(|s| {
                    // The user may have typed something while we waited.
                    if s.message.trim().is_empty() {
                        s.message = text;
                        true
                    } else {
                        false
                    }
                });
                if stored {
                    self.status.publish(Status::MessageGenerated);
                } else {
                    debug!("Discarding generated message; the user already wrote one");
                }
                stored
            }
            Err(err) => {
                let detail = match err {
                    NageError::Generation(detail) => detail,
                    other => other.to_string(),
                };
                self.status.publish(Status::GenerationFailed(detail));
                false
            }
        }
    }
}
