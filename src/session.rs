//! The current actor, passed explicitly to the layers that check ownership.
//! The store and reconciler never see it.

use crate::models::{Setlist, Song, User};

#[derive(Debug, Clone)]
pub struct Session {
    actor: User,
}

impl Session {
    pub fn new(actor: User) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &User {
        &self.actor
    }

    pub fn actor_id(&self) -> i64 {
        self.actor.id
    }

    /// Only the owner may delete a song. Songs whose owner was removed can no
    /// longer be deleted by anyone.
    pub fn can_delete_song(&self, song: &Song) -> bool {
        song.user_id == Some(self.actor.id)
    }

    /// Any actor may edit a song's fields.
    pub fn can_edit_song(&self, _song: &Song) -> bool {
        true
    }

    /// Renaming, reordering and deleting a setlist are reserved to its owner.
    pub fn can_modify_setlist(&self, setlist: &Setlist) -> bool {
        setlist.user_id == self.actor.id
    }
}
