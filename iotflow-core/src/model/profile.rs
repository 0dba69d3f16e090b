//! Traffic profiles
//!
//! An ordered collection of traffic classes assigned to a connection or
//! application. Classes run independently; order carries no semantics. An
//! empty profile is legal: the connection accepts but never streams.

use std::sync::Arc;

use crate::model::traffic_class::TrafficClass;

#[derive(Debug, Clone, Default)]
pub struct TrafficProfile {
    classes: Vec<Arc<TrafficClass>>,
}

impl TrafficProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_classes(classes: Vec<Arc<TrafficClass>>) -> Self {
        Self { classes }
    }

    pub fn push(&mut self, class: Arc<TrafficClass>) {
        self.classes.push(class);
    }

    pub fn classes(&self) -> &[Arc<TrafficClass>] {
        &self.classes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TrafficClass>> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn clear(&mut self) {
        self.classes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_keeps_insertion_order() {
        let mut profile = TrafficProfile::new();
        profile.push(Arc::new(
            TrafficClass::basic(2, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0).unwrap(),
        ));
        profile.push(Arc::new(
            TrafficClass::basic(1, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0).unwrap(),
        ));

        let ids: Vec<u16> = profile.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(profile.len(), 2);
        assert!(!profile.is_empty());
    }
}
