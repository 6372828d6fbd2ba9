//! # Test Helpers
//!
//! In-memory fakes of the external collaborators plus fixture builders, shared
//! by unit tests and the integration suite under `tests/`.

pub mod fake_platform;
pub mod fixtures;

pub use fake_platform::{FakeClientProvider, FakeLogReader, FakePlatform, FakePlatformState};
pub use fixtures::{
    app_log, collaborators, context_for, existing_app, managed_instance, process_state, target,
    TestEnvironment, TEST_SPACE_GUID, TEST_USER,
};
