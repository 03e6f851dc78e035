use std::fmt;
use std::sync::Arc;

/// A strongly typed identifier for a Room.
/// Wraps an `Arc<String>` for cheap cloning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(pub Arc<String>);

/// A strongly typed user display name. Unique across live sessions
/// for the lifetime of that session (spec.md §3, invariant 1).
/// Wraps an `Arc<String>` for cheap cloning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserName(pub Arc<String>);

/// Internal identifier for one accepted socket, assigned at accept
/// time. Distinct from `UserName`: a socket exists before its owner
/// has completed `initiation` and chosen a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

// Implement Display for easy logging
impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// Implement conversion from String/&str
impl From<String> for RoomId {
    fn from(s: String) -> Self {
        RoomId(Arc::new(s))
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        RoomId(Arc::new(s.to_string()))
    }
}

impl From<String> for UserName {
    fn from(s: String) -> Self {
        UserName(Arc::new(s))
    }
}

impl From<&str> for UserName {
    fn from(s: &str) -> Self {
        UserName(Arc::new(s.to_string()))
    }
}

// Helper for referencing the inner string
impl AsRef<str> for RoomId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UserName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_conversion() {
        let id_str = "room-123";
        let id: RoomId = RoomId::from(id_str);
        assert_eq!(id.as_ref(), id_str);

        let id_string = String::from("room-456");
        let id2: RoomId = RoomId::from(id_string.clone());
        assert_eq!(id2.as_ref(), "room-456");
    }

    #[test]
    fn test_user_name_conversion() {
        let name = UserName::from("alice");
        assert_eq!(name.to_string(), "alice");
    }

    #[test]
    fn test_display_trait() {
        let id = RoomId::from("room-string");
        assert_eq!(format!("{}", id), "room-string");
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId(7);
        assert_eq!(id.to_string(), "conn-7");
    }
}
