use std::collections::BTreeMap;

use tracing::info;

use crate::entities::Profession;

/// A title is in `liked` exactly when its last feedback was `true`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedbackTracker {
    feedback: BTreeMap<String, bool>,
    liked: BTreeMap<String, Profession>,
}

impl FeedbackTracker {
    pub fn set_feedback(&mut self, title: &str, liked: bool, record: &Profession) {
        let previous = self.feedback.insert(title.to_string(), liked);
        if liked {
            self.liked.insert(title.to_string(), record.clone());
        } else {
            self.liked.remove(title);
        }
        if previous != Some(liked) {
            info!(liked, liked_total = self.liked.len(), "profession feedback recorded");
        }
    }

    pub fn feedback(&self) -> &BTreeMap<String, bool> {
        &self.feedback
    }

    pub fn liked(&self) -> &BTreeMap<String, Profession> {
        &self.liked
    }

    pub fn liked_profession(&self, title: &str) -> Option<&Profession> {
        self.liked.get(title)
    }
}
