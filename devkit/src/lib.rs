/*!
# mcwatch DevKit - stubs and helpers for tests

- Stub Minecraft server speaking Server List Ping
- Stub Discord REST API recording posts and command registrations
- Stub MQTT broker recording publishes
- Harness wiring both for end-to-end tests
*/

pub mod discord_stub;
pub mod mqtt_stub;
pub mod status_stub;
pub mod test_utils;

pub use discord_stub::{CommandRegistration, PostedMessage, StubDiscordApi, STUB_APPLICATION_ID};
pub use mqtt_stub::{StubMqttBroker, StubMqttMessage};
pub use status_stub::{StubMode, StubStatusServer};
pub use test_utils::TestHarness;
