//! The backend contract shared by the oracle and the system under test.

use crate::catalog::CatalogGraph;
use crate::command::Command;
use crate::error::SystemError;

/// A catalog engine driven by the [`Runner`](crate::Runner).
///
/// Commands carry references into the oracle's last snapshot, so a backend
/// resolves targets by name path rather than by node identity.
pub trait System {
    /// Name used in logs and error reports.
    fn name(&self) -> &str;

    /// Apply one command. Any error ends the run.
    fn execute(&self, command: &Command<'_>) -> Result<(), SystemError>;

    /// A fresh snapshot of the current catalog.
    fn state(&self) -> Result<CatalogGraph, SystemError>;
}

impl<S: System + ?Sized> System for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(&self, command: &Command<'_>) -> Result<(), SystemError> {
        (**self).execute(command)
    }

    fn state(&self) -> Result<CatalogGraph, SystemError> {
        (**self).state()
    }
}

impl<S: System + ?Sized> System for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(&self, command: &Command<'_>) -> Result<(), SystemError> {
        (**self).execute(command)
    }

    fn state(&self) -> Result<CatalogGraph, SystemError> {
        (**self).state()
    }
}
