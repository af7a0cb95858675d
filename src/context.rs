use crate::error::ArcError;
use crate::models::{Scope, Workspace};

/// Who is acting and in which workspace. Passed to every manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub wallet: Option<String>,
    pub workspace: Workspace,
}

impl Context {
    pub fn new(wallet: Option<String>, workspace: Workspace) -> Self {
        // Blank addresses count as disconnected
        let wallet = wallet.map(|w| w.trim().to_string()).filter(|w| !w.is_empty());
        Self { wallet, workspace }
    }

    pub fn wallet(&self) -> Result<&str, ArcError> {
        self.wallet.as_deref().ok_or(ArcError::WalletNotConnected)
    }

    pub fn scope(&self) -> Result<Scope, ArcError> {
        Ok(Scope::new(self.wallet()?, self.workspace.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_requires_wallet() {
        let ctx = Context::new(Some("  ".to_string()), Workspace::default());
        assert!(matches!(ctx.scope(), Err(ArcError::WalletNotConnected)));

        let ctx = Context::new(Some("0xabc".to_string()), Workspace::default());
        assert_eq!(ctx.scope().unwrap(), Scope::new("0xabc", "1"));
    }
}
