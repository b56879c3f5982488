use std::error::Error;
use std::path::PathBuf;

use crate::state::{AppState, Session, StateError};

#[derive(Clone)]
pub struct OpContext {
    /// Optional custom config path (defaults to ~/.ghost)
    pub config_path: Option<PathBuf>,
    pub user: Option<String>,
    pub passphrase: Option<String>,
}

impl OpContext {
    pub fn new(
        config_path: Option<PathBuf>,
        user: Option<String>,
        passphrase: Option<String>,
    ) -> Self {
        Self {
            config_path,
            user,
            passphrase,
        }
    }

    /// Load the ghost directory this context points at
    pub fn state(&self) -> Result<AppState, StateError> {
        AppState::load(self.config_path.clone())
    }

    /// Load state and log in as `--user` with `--passphrase`
    pub fn login(&self) -> Result<(AppState, Session), StateError> {
        let state = self.state()?;
        let user = self.user.as_deref().ok_or(StateError::MissingUser)?;
        let passphrase = self
            .passphrase
            .as_deref()
            .ok_or(StateError::MissingPassphrase)?;
        let session = state.login(user, passphrase)?;
        Ok((state, session))
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
