use std::fmt;

use serde::{Deserialize, Serialize};

/// One emergency contact as stored by the profile backend.
///
/// `priority` orders dispatch iteration, ascending: lower numbers are
/// contacted first. 0 is the unset/invalid sentinel and is rejected at
/// save time, never silently coerced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub relationship: String,
    pub priority: u32,
    pub address: Option<String>,
}

impl Contact {
    pub fn validate(&self) -> Result<(), ContactError> {
        if self.priority == 0 {
            return Err(ContactError::PriorityUnset);
        }
        if self.name.trim().is_empty() {
            return Err(ContactError::EmptyName);
        }
        if self.phone_number.trim().is_empty() {
            return Err(ContactError::EmptyPhoneNumber);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    PriorityUnset,
    EmptyName,
    EmptyPhoneNumber,
    /// Delete requested on a row that is still being edited.
    UnsavedEdit,
    RowOutOfRange(usize),
}

impl fmt::Display for ContactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactError::PriorityUnset => write!(f, "priority must be greater than 0"),
            ContactError::EmptyName => write!(f, "name must not be empty"),
            ContactError::EmptyPhoneNumber => write!(f, "phone number must not be empty"),
            ContactError::UnsavedEdit => write!(f, "save contact before deleting"),
            ContactError::RowOutOfRange(i) => write!(f, "no contact row at index {}", i),
        }
    }
}

impl std::error::Error for ContactError {}

/// Read side of the external contact store. The core only reads the
/// ordered list; it never writes through this seam.
pub trait ContactDirectory {
    /// Contacts for the current session, ascending by priority.
    fn ordered_contacts(&self) -> Vec<Contact>;
}

/// Directory backed by a plain vector. Used by the demo binary and
/// by tests standing in for the cloud store.
#[derive(Default)]
pub struct InMemoryDirectory {
    contacts: Vec<Contact>,
}

impl InMemoryDirectory {
    pub fn new(contacts: Vec<Contact>) -> Self {
        InMemoryDirectory { contacts }
    }
}

impl ContactDirectory for InMemoryDirectory {
    fn ordered_contacts(&self) -> Vec<Contact> {
        let mut ordered = self.contacts.clone();
        ordered.sort_by_key(|c| c.priority);
        ordered
    }
}

/// Per-row editor command. One reducer consumes all of these instead of
/// a callback per button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactCommand {
    Edit,
    Save,
    Cancel,
    Delete,
}

/// `committed` is `None` until the row's first successful save, so a
/// brand-new row that is cancelled simply disappears instead of leaving
/// an invalid contact behind.
#[derive(Clone, Debug)]
struct ContactRow {
    committed: Option<Contact>,
    draft: Option<Contact>,
}

impl ContactRow {
    fn editing(&self) -> bool {
        self.draft.is_some()
    }
}

/// Editable list of contact rows, the local counterpart of the
/// directory's contents.
#[derive(Default)]
pub struct ContactRoster {
    rows: Vec<ContactRow>,
    next_id: u64,
}

impl ContactRoster {
    pub fn new(contacts: Vec<Contact>) -> Self {
        let rows = contacts
            .into_iter()
            .map(|committed| ContactRow {
                committed: Some(committed),
                draft: None,
            })
            .collect();
        ContactRoster { rows, next_id: 0 }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Saved contacts only; rows still waiting on their first save are
    /// not included.
    pub fn contacts(&self) -> Vec<Contact> {
        self.rows
            .iter()
            .filter_map(|r| r.committed.clone())
            .collect()
    }

    /// Append a blank row that starts in edit mode.
    pub fn add_blank(&mut self) -> usize {
        self.next_id += 1;
        let blank = Contact {
            id: format!("local-{}", self.next_id),
            name: String::new(),
            phone_number: String::new(),
            relationship: String::new(),
            priority: 0,
            address: None,
        };
        self.rows.push(ContactRow {
            committed: None,
            draft: Some(blank),
        });
        self.rows.len() - 1
    }

    /// Mutable access to the draft of a row in edit mode.
    pub fn draft_mut(&mut self, index: usize) -> Option<&mut Contact> {
        self.rows.get_mut(index).and_then(|r| r.draft.as_mut())
    }

    /// Apply one command to one row.
    ///
    /// Save validates the draft first; an invalid draft leaves the row in
    /// edit mode with the guard error surfaced to the caller. Cancel on a
    /// row that was never saved removes the row entirely. Delete on a
    /// row still being edited is rejected rather than discarding the edit.
    pub fn apply(&mut self, index: usize, command: ContactCommand) -> Result<(), ContactError> {
        let row = self
            .rows
            .get_mut(index)
            .ok_or(ContactError::RowOutOfRange(index))?;

        match command {
            ContactCommand::Edit => {
                if row.draft.is_none() {
                    row.draft = row.committed.clone();
                }
                Ok(())
            }
            ContactCommand::Save => {
                let draft = match row.draft.take() {
                    Some(d) => d,
                    None => return Ok(()), // nothing pending
                };
                if let Err(err) = draft.validate() {
                    row.draft = Some(draft); // stay in edit mode
                    return Err(err);
                }
                row.committed = Some(draft);
                Ok(())
            }
            ContactCommand::Cancel => {
                row.draft = None;
                if row.committed.is_none() {
                    self.rows.remove(index);
                }
                Ok(())
            }
            ContactCommand::Delete => {
                if row.editing() {
                    return Err(ContactError::UnsavedEdit);
                }
                self.rows.remove(index);
                Ok(())
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::contact;
    use super::*;

    #[test]
    fn directory_orders_by_priority_ascending() {
        let directory =
            InMemoryDirectory::new(vec![contact("a", 3), contact("b", 1), contact("c", 2)]);
        let ordered = directory.ordered_contacts();
        let ids: Vec<&str> = ordered.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn priority_zero_is_rejected_at_save() {
        let mut roster = ContactRoster::new(vec![]);
        let index = roster.add_blank();
        {
            let draft = roster.draft_mut(index).unwrap();
            draft.name = "Ana".to_string();
            draft.phone_number = "0712345678".to_string();
            // priority left at the 0 sentinel
        }
        assert_eq!(
            roster.apply(index, ContactCommand::Save),
            Err(ContactError::PriorityUnset)
        );
        // The guard keeps the row editable, nothing committed.
        assert!(roster.draft_mut(index).is_some());

        roster.draft_mut(index).unwrap().priority = 1;
        roster.apply(index, ContactCommand::Save).unwrap();
        assert_eq!(roster.contacts()[0].priority, 1);
    }

    #[test]
    fn empty_fields_are_rejected() {
        let nameless = Contact {
            name: "  ".to_string(),
            ..contact("x", 1)
        };
        assert_eq!(nameless.validate(), Err(ContactError::EmptyName));

        let phoneless = Contact {
            phone_number: String::new(),
            ..contact("x", 1)
        };
        assert_eq!(phoneless.validate(), Err(ContactError::EmptyPhoneNumber));
    }

    #[test]
    fn cancelled_blank_row_vanishes_without_a_committed_contact() {
        let mut roster = ContactRoster::new(vec![contact("a", 1)]);
        let index = roster.add_blank();
        assert_eq!(roster.len(), 2);
        // The unsaved blank is not visible as a contact.
        assert_eq!(roster.contacts().len(), 1);

        roster.apply(index, ContactCommand::Cancel).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.contacts()[0].id, "a");
    }

    #[test]
    fn cancel_discards_draft_edits() {
        let mut roster = ContactRoster::new(vec![contact("a", 1)]);
        roster.apply(0, ContactCommand::Edit).unwrap();
        roster.draft_mut(0).unwrap().name = "Changed".to_string();
        roster.apply(0, ContactCommand::Cancel).unwrap();
        assert_eq!(roster.contacts()[0].name, "Contact a");
    }

    #[test]
    fn delete_while_editing_is_rejected() {
        let mut roster = ContactRoster::new(vec![contact("a", 1)]);
        roster.apply(0, ContactCommand::Edit).unwrap();
        assert_eq!(
            roster.apply(0, ContactCommand::Delete),
            Err(ContactError::UnsavedEdit)
        );
        assert_eq!(roster.len(), 1);

        roster.apply(0, ContactCommand::Cancel).unwrap();
        roster.apply(0, ContactCommand::Delete).unwrap();
        assert!(roster.is_empty());
    }
}
