use crate::domain::DomainError;

/// Port for restarting the application process.
pub trait Relauncher: Send + Sync {
    fn relaunch(&self) -> Result<(), DomainError>;
}
