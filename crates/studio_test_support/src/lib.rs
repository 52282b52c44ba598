pub mod fake_connection;
pub mod fixtures;

pub use fake_connection::{
    FakeConnection, FakeConnectionStats, FakeQueryOutcome, FakeUpdateOutcome,
};
pub use fixtures::init_test_logging;
