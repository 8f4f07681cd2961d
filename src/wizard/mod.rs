//! Headless models of the object manager and the object creation wizard.
//!
//! No rendering happens here: callers feed user actions in and read back
//! pages, messages and hints.

pub mod manager;
pub mod naming;
pub mod object_wizard;

pub use manager::{ObjectManager, ObjectSummary};
pub use naming::{validate_name, NameError};
pub use object_wizard::{ObjectWizard, WizardEvent, WizardOutcome, WizardPage};
