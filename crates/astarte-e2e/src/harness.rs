//! Drives one verification run: a background thread parses stdin
//! commands onto an `SpscQueue`, the async loop here drains it alongside
//! the transport's inbound events, feeding both into the `Matcher`.

use crate::command::{parse_line, Command};
use crate::matcher::{Expectation, Matcher, Observed};
use crate::spsc::SpscQueue;
use astarte_device_core::{decode_message, decode_object_message, encode_message, encode_object_message, Aggregation, Introspection};
use astarte_device_net::topic::{ParsedTopic, TopicBuilder};
use astarte_device_net::{Transport, TransportEvent};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Harness<T: Transport> {
    transport: Arc<T>,
    topics: TopicBuilder,
    introspection: Introspection,
    matcher: Matcher,
}

impl<T: Transport> Harness<T> {
    pub fn new(transport: Arc<T>, realm: &str, device_id: &str, introspection: Introspection) -> Self {
        Harness {
            transport,
            topics: TopicBuilder::new(realm, device_id),
            introspection,
            matcher: Matcher::new(),
        }
    }

    /// Spawns the stdin-reading thread and runs the async drive loop
    /// until a `disconnect` command is processed. Returns whether every
    /// declared expectation was satisfied.
    pub async fn run(mut self) -> bool {
        let queue: Arc<SpscQueue<Command>> = Arc::new(SpscQueue::new());
        let reader_queue = queue.clone();
        let introspection_for_reader = self.introspection.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => match parse_line(&line, &introspection_for_reader) {
                        Ok(cmd) => {
                            while reader_queue.push(cmd.clone()).is_err() {
                                std::thread::yield_now();
                            }
                            if matches!(cmd, Command::Disconnect) {
                                break;
                            }
                        }
                        Err(e) => warn!("bad command line: {e}"),
                    },
                    Err(e) => {
                        warn!("stdin read error: {e}");
                        break;
                    }
                }
            }
        });

        loop {
            if let Some(cmd) = queue.pop() {
                if matches!(cmd, Command::Disconnect) {
                    let _ = self.transport.disconnect().await;
                    break;
                }
                if let Err(e) = self.execute(cmd).await {
                    warn!("command execution failed: {e}");
                }
                continue;
            }

            match self.transport.poll().await {
                Ok(TransportEvent::Publish { topic, payload, .. }) => {
                    self.handle_publish(&topic, &payload);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("transport error: {e}");
                    break;
                }
            }
        }

        if self.matcher.is_satisfied() {
            info!("all expectations satisfied");
            true
        } else {
            for failure in self.matcher.failures() {
                warn!("{failure}");
            }
            warn!("{} expectation(s) never matched", self.matcher.outstanding_count());
            false
        }
    }

    async fn execute(&mut self, cmd: Command) -> astarte_device_net::Result<()> {
        match cmd {
            Command::ExpectIndividual { interface, path, value } => {
                self.matcher.expect(Expectation::Individual { interface, path, value });
                Ok(())
            }
            Command::ExpectObject { interface, entries } => {
                self.matcher.expect(Expectation::Object { interface, entries });
                Ok(())
            }
            Command::ExpectPropertySet { interface, path, value } => {
                self.matcher.expect(Expectation::PropertySet { interface, path, value });
                Ok(())
            }
            Command::ExpectPropertyUnset { interface, path } => {
                self.matcher.expect(Expectation::PropertyUnset { interface, path });
                Ok(())
            }
            Command::SendIndividual { interface, path, value } => {
                let bytes = encode_message(&value, None);
                self.transport.publish(&self.topics.data(&interface, &path), bytes, 2, false).await?;
                Ok(())
            }
            Command::SendObject { interface, entries } => {
                let base_path = entries
                    .first()
                    .and_then(|e| e.path.rsplit_once('/'))
                    .map(|(prefix, _)| prefix.to_string())
                    .unwrap_or_default();
                let bytes = encode_object_message(&entries, None);
                self.transport.publish(&self.topics.data(&interface, &base_path), bytes, 2, false).await?;
                Ok(())
            }
            Command::SendPropertySet { interface, path, value } => {
                let bytes = encode_message(&value, None);
                self.transport.publish(&self.topics.data(&interface, &path), bytes, 2, true).await?;
                Ok(())
            }
            Command::SendPropertyUnset { interface, path } => {
                self.transport.publish(&self.topics.data(&interface, &path), Vec::new(), 2, true).await?;
                Ok(())
            }
            Command::Disconnect => unreachable!("handled by caller"),
        }
    }

    fn handle_publish(&mut self, topic: &str, payload: &[u8]) {
        let Some(ParsedTopic::Data(data)) = self.topics.parse(topic) else {
            return;
        };
        let Some(iface) = self.introspection.get_by_name(&data.interface) else {
            warn!("publish for unknown interface {}", data.interface);
            return;
        };

        if iface.aggregation == Aggregation::Object {
            let mapping_type_of = |key: &str| iface.get_mapping(&format!("/{key}")).map(|m| m.mapping_type);
            match decode_object_message(payload, mapping_type_of, astarte_device_core::MAX_DOCUMENT_BYTES) {
                Ok((entries, _ts)) => self.matcher.observe(Observed::Object { interface: &data.interface, entries: &entries }),
                Err(e) => warn!("malformed object payload: {e}"),
            }
        } else if payload.is_empty() {
            self.matcher.observe(Observed::PropertyUnset { interface: &data.interface, path: &data.path });
        } else {
            let Some(mapping) = iface.get_mapping(&data.path) else {
                warn!("publish for unknown mapping {}{}", data.interface, data.path);
                return;
            };
            match decode_message(mapping.mapping_type, payload, astarte_device_core::MAX_DOCUMENT_BYTES) {
                Ok((value, _ts)) => {
                    self.matcher.observe(Observed::Individual { interface: &data.interface, path: &data.path, value: &value })
                }
                Err(e) => warn!("malformed payload: {e}"),
            }
        }
    }
}
