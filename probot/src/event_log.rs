use atomgit::Event;
use std::fmt;

/// Identifying fields of an event, rendered as `key=value` pairs so every
/// log record about one delivery can be correlated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLog {
    fields: Vec<(&'static str, String)>,
}

impl EventLog {
    pub fn new(event: &Event) -> Self {
        let fields = event
            .fields()
            .into_iter()
            .map(|(key, value)| (key, value.to_owned()))
            .collect();

        Self { fields }
    }
}

impl fmt::Display for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod test {
    use super::EventLog;
    use atomgit::{Event, EventType};
    use bytes::Bytes;

    #[test]
    fn renders_non_empty_fields() {
        let mut event = Event::new(EventType::Issue, "issues", Bytes::new());
        event.action = "created".to_owned();
        event.org = "org1".to_owned();
        event.repo = "repo1".to_owned();

        let log = EventLog::new(&event);
        assert_eq!(
            log.to_string(),
            "[event-type=issues event-action=created org=org1 repo=repo1]"
        );
        assert!(!log.to_string().contains("url="));
    }
}
