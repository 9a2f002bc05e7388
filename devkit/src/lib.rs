/*!
# ofmetrics devkit - test doubles and helpers for the controller

Lets the controller run without a switch or a protocol stack:
- a mock transport that records every command and can be told to fail
- builders for switch events and raw Ethernet frames
- a harness wiring the controller, the metrics store and the mock together
*/

pub mod events;
pub mod mock_transport;
pub mod test_utils;

pub use events::EventBuilder;
pub use mock_transport::{MockTransport, SentCommand};
pub use test_utils::TestHarness;
