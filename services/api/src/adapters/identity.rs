//! services/api/src/adapters/identity.rs
//!
//! An `IdentityProvider` for one connected client. The interactive flow asks the
//! client to show its account picker, waits for the chosen credentials and checks
//! them against the account directory.

use async_trait::async_trait;
use book_reels_core::domain::Identity;
use book_reels_core::ports::{IdentityProvider, PortError, PortResult, Prompt, SignInOptions};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

use crate::adapters::accounts::{verify_credentials, AccountDirectory};

/// Asks the client to show the account picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickerPrompt {
    /// Show the picker even if the client remembers an account.
    pub force_select: bool,
}

/// What the client answered from the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerAnswer {
    Chosen { email: String, password: String },
    Cancelled,
}

pub struct PickerIdentityProvider {
    accounts: Arc<dyn AccountDirectory>,
    prompts: mpsc::UnboundedSender<PickerPrompt>,
    session: watch::Sender<Option<Identity>>,
    pending: Mutex<Option<oneshot::Sender<PickerAnswer>>>,
}

impl PickerIdentityProvider {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        prompts: mpsc::UnboundedSender<PickerPrompt>,
    ) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts,
            prompts,
            session,
            pending: Mutex::new(None),
        }
    }

    /// Hands the client's picker answer to the flow waiting for it.
    /// Returns false when no flow is waiting.
    pub fn answer(&self, answer: PickerAnswer) -> bool {
        match self.pending().take() {
            Some(tx) => tx.send(answer).is_ok(),
            None => false,
        }
    }

    /// Fails any flow still waiting. Called when the client goes away.
    pub fn close(&self) {
        self.pending().take();
    }

    fn pending(&self) -> MutexGuard<'_, Option<oneshot::Sender<PickerAnswer>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl IdentityProvider for PickerIdentityProvider {
    fn current(&self) -> Option<Identity> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.session.subscribe()
    }

    async fn sign_in_interactive(&self, options: SignInOptions) -> PortResult<Identity> {
        let (tx, rx) = oneshot::channel();
        // A newer flow replaces an older one; the older one then fails below.
        *self.pending() = Some(tx);

        let prompt = PickerPrompt { force_select: options.prompt == Prompt::SelectAccount };
        self.prompts
            .send(prompt)
            .map_err(|_| PortError::AuthFailure("client is gone".to_string()))?;

        let answer = rx
            .await
            .map_err(|_| PortError::AuthFailure("sign-in was interrupted".to_string()))?;

        match answer {
            PickerAnswer::Chosen { email, password } => {
                let identity = verify_credentials(self.accounts.as_ref(), &email, &password).await?;
                info!("Account {} chosen from picker", identity.uid);
                self.session.send_replace(Some(identity.clone()));
                Ok(identity)
            }
            PickerAnswer::Cancelled => {
                warn!("Account picker was cancelled");
                Err(PortError::AuthFailure("sign-in cancelled".to_string()))
            }
        }
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.session.send_if_modified(|current| current.take().is_some());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::accounts::{new_account, InMemoryAccountDirectory};

    async fn provider_with_account() -> (
        Arc<PickerIdentityProvider>,
        mpsc::UnboundedReceiver<PickerPrompt>,
        Identity,
    ) {
        let accounts = Arc::new(InMemoryAccountDirectory::new());
        let record = new_account("reader@example.com", Some("Reader".into()), None, "hunter22").unwrap();
        let identity = accounts.create_account(record).await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(PickerIdentityProvider::new(accounts, tx)), rx, identity)
    }

    fn select_account() -> SignInOptions {
        SignInOptions { prompt: Prompt::SelectAccount }
    }

    #[tokio::test]
    async fn chosen_account_becomes_the_session() {
        let (provider, mut prompts, identity) = provider_with_account().await;
        let flow = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.sign_in_interactive(select_account()).await })
        };

        let prompt = prompts.recv().await.unwrap();
        assert!(prompt.force_select);
        assert!(provider.answer(PickerAnswer::Chosen {
            email: "reader@example.com".into(),
            password: "hunter22".into(),
        }));

        let signed_in = flow.await.unwrap().unwrap();
        assert_eq!(signed_in, identity);
        assert_eq!(provider.current(), Some(identity));
    }

    #[tokio::test]
    async fn cancel_and_bad_password_fail_auth() {
        let (provider, mut prompts, _) = provider_with_account().await;

        let flow = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.sign_in_interactive(select_account()).await })
        };
        prompts.recv().await.unwrap();
        provider.answer(PickerAnswer::Cancelled);
        assert!(matches!(flow.await.unwrap(), Err(PortError::AuthFailure(_))));

        let flow = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.sign_in_interactive(select_account()).await })
        };
        prompts.recv().await.unwrap();
        provider.answer(PickerAnswer::Chosen {
            email: "reader@example.com".into(),
            password: "nope".into(),
        });
        assert!(matches!(flow.await.unwrap(), Err(PortError::AuthFailure(_))));
        assert!(provider.current().is_none());
    }

    #[tokio::test]
    async fn closing_interrupts_a_waiting_flow() {
        let (provider, mut prompts, _) = provider_with_account().await;
        let flow = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.sign_in_interactive(SignInOptions::default()).await })
        };
        let prompt = prompts.recv().await.unwrap();
        assert!(!prompt.force_select);
        provider.close();
        assert!(matches!(flow.await.unwrap(), Err(PortError::AuthFailure(_))));
        assert!(!provider.answer(PickerAnswer::Cancelled));
    }
}
