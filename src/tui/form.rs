use crate::api::{CreateNoteRequest, Note, NoteTag, UpdateNoteRequest};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 50;
pub const CONTENT_MAX: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Content,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: FormField,
    pub message: String,
}

/// Raw form input. The tag is kept as text until submit so validation can
/// reject values outside the allowed set instead of panicking on them.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub tag: String,
}

type Predicate = fn(&NoteDraft) -> bool;

/// Validation rules, checked in order. The first failing rule per field is
/// the one reported, so an empty title says "required", not "too short".
const RULES: &[(FormField, Predicate, &str)] = &[
    (FormField::Title, |d| !d.title.is_empty(), "Title is required"),
    (
        FormField::Title,
        |d| d.title.chars().count() >= TITLE_MIN,
        "Title must be at least 3 characters",
    ),
    (
        FormField::Title,
        |d| d.title.chars().count() <= TITLE_MAX,
        "Title must be at most 50 characters",
    ),
    (
        FormField::Content,
        |d| d.content.chars().count() <= CONTENT_MAX,
        "Content must be at most 500 characters",
    ),
    (FormField::Tag, |d| !d.tag.is_empty(), "Tag is required"),
    (
        FormField::Tag,
        |d| d.tag.parse::<NoteTag>().is_ok(),
        "Invalid tag",
    ),
];

impl NoteDraft {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors: Vec<FieldError> = Vec::new();
        for (field, passes, message) in RULES {
            if errors.iter().any(|e| e.field == *field) {
                continue;
            }
            if !passes(self) {
                errors.push(FieldError {
                    field: *field,
                    message: (*message).to_string(),
                });
            }
        }
        errors
    }

    /// Parse into the create body. Empty content is omitted from the
    /// request rather than sent as an empty string.
    pub fn create_request(&self) -> Result<CreateNoteRequest, Vec<FieldError>> {
        let tag = self.validated_tag()?;
        Ok(CreateNoteRequest {
            title: self.title.clone(),
            content: if self.content.is_empty() {
                None
            } else {
                Some(self.content.clone())
            },
            tag,
        })
    }

    /// Parse into the update body. Every field is sent, so clearing the
    /// content of an existing note actually clears it on the server.
    pub fn update_request(&self) -> Result<UpdateNoteRequest, Vec<FieldError>> {
        let tag = self.validated_tag()?;
        Ok(UpdateNoteRequest {
            title: Some(self.title.clone()),
            content: Some(self.content.clone()),
            tag: Some(tag),
        })
    }

    fn validated_tag(&self) -> Result<NoteTag, Vec<FieldError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        self.tag.parse::<NoteTag>().map_err(|err| {
            vec![FieldError {
                field: FormField::Tag,
                message: err.to_string(),
            }]
        })
    }
}

/// The request a latched form wants sent.
#[derive(Debug)]
pub enum FormSubmit {
    Create(CreateNoteRequest),
    Update { id: String, request: UpdateNoteRequest },
}

/// State of the create/edit form: the draft, which field has focus, the
/// current validation errors, and the submit latch that keeps a second
/// Enter from firing a duplicate request while one is on the wire.
pub struct NoteForm {
    pub draft: NoteDraft,
    pub focus: FormField,
    pub errors: Vec<FieldError>,
    pub submitting: bool,
    pub submit_error: Option<String>,
    pub editing_id: Option<String>,
}

impl NoteForm {
    pub fn new() -> Self {
        NoteForm {
            draft: NoteDraft {
                title: String::new(),
                content: String::new(),
                tag: NoteTag::Todo.as_str().to_string(),
            },
            focus: FormField::Title,
            errors: Vec::new(),
            submitting: false,
            submit_error: None,
            editing_id: None,
        }
    }

    /// A form prefilled from an existing note, submitting as an update.
    pub fn edit(note: &Note) -> Self {
        NoteForm {
            draft: NoteDraft {
                title: note.title.clone(),
                content: note.content.clone(),
                tag: note.tag.as_str().to_string(),
            },
            focus: FormField::Title,
            errors: Vec::new(),
            submitting: false,
            submit_error: None,
            editing_id: Some(note.id.clone()),
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = match self.focus {
            FormField::Title => FormField::Content,
            FormField::Content => FormField::Tag,
            FormField::Tag => FormField::Title,
        };
    }

    pub fn focus_prev(&mut self) {
        self.focus = match self.focus {
            FormField::Title => FormField::Tag,
            FormField::Content => FormField::Title,
            FormField::Tag => FormField::Content,
        };
    }

    /// Step the tag through the allowed values, wrapping at both ends.
    pub fn cycle_tag(&mut self, forward: bool) {
        let count = NoteTag::ALL.len();
        let current = NoteTag::ALL
            .iter()
            .position(|tag| tag.as_str() == self.draft.tag)
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
        self.draft.tag = NoteTag::ALL[next].as_str().to_string();
    }

    /// Validate the draft and, when it is clean, latch into submitting.
    ///
    /// Returns `None` while a submit is already in flight or when
    /// validation fails; failures are stored in `errors` for rendering.
    pub fn begin_submit(&mut self) -> Option<FormSubmit> {
        if self.submitting {
            return None;
        }
        let built = match &self.editing_id {
            Some(id) => self
                .draft
                .update_request()
                .map(|request| FormSubmit::Update {
                    id: id.clone(),
                    request,
                }),
            None => self.draft.create_request().map(FormSubmit::Create),
        };
        match built {
            Ok(submit) => {
                self.errors.clear();
                self.submit_error = None;
                self.submitting = true;
                Some(submit)
            }
            Err(errors) => {
                self.errors = errors;
                None
            }
        }
    }

    /// Drop back to editing after a failed request so the user can retry
    /// without losing the draft.
    pub fn submit_failed(&mut self, message: String) {
        self.submitting = false;
        self.submit_error = Some(message);
    }

    pub fn error_for(&self, field: FormField) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str, content: &str, tag: &str) -> NoteDraft {
        NoteDraft {
            title: title.to_string(),
            content: content.to_string(),
            tag: tag.to_string(),
        }
    }

    #[test]
    fn empty_title_reports_required_not_length() {
        let errors = draft("", "", "Todo").validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, FormField::Title);
        assert_eq!(errors[0].message, "Title is required");
    }

    #[test]
    fn title_length_boundaries() {
        assert!(!draft(&"a".repeat(2), "", "Todo").validate().is_empty());
        assert!(draft(&"a".repeat(3), "", "Todo").validate().is_empty());
        assert!(draft(&"a".repeat(50), "", "Todo").validate().is_empty());

        let errors = draft(&"a".repeat(51), "", "Todo").validate();
        assert_eq!(errors[0].message, "Title must be at most 50 characters");
    }

    #[test]
    fn content_is_optional_but_capped() {
        assert!(draft("Groceries", "", "Todo").validate().is_empty());
        assert!(
            draft("Groceries", &"x".repeat(500), "Todo")
                .validate()
                .is_empty()
        );

        let errors = draft("Groceries", &"x".repeat(501), "Todo").validate();
        assert_eq!(errors[0].field, FormField::Content);
        assert_eq!(errors[0].message, "Content must be at most 500 characters");
    }

    #[test]
    fn tag_outside_the_set_is_invalid() {
        let errors = draft("Groceries", "", "Unknown").validate();
        assert_eq!(errors[0].field, FormField::Tag);
        assert_eq!(errors[0].message, "Invalid tag");

        assert!(draft("Groceries", "", "Work").validate().is_empty());
    }

    #[test]
    fn one_error_per_field_in_field_order() {
        let errors = draft("", &"x".repeat(501), "Unknown").validate();
        let fields: Vec<FormField> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![FormField::Title, FormField::Content, FormField::Tag]
        );
    }

    #[test]
    fn create_request_omits_empty_content() {
        let request = draft("Call dentist", "", "Todo")
            .create_request()
            .expect("valid draft");
        assert_eq!(request.content, None);

        let request = draft("Call dentist", "ask about friday", "Todo")
            .create_request()
            .expect("valid draft");
        assert_eq!(request.content.as_deref(), Some("ask about friday"));
    }

    #[test]
    fn update_request_sends_every_field() {
        let request = draft("Renamed", "", "Work")
            .update_request()
            .expect("valid draft");
        assert_eq!(request.title.as_deref(), Some("Renamed"));
        assert_eq!(request.content.as_deref(), Some(""), "clearing content must stick");
        assert_eq!(request.tag, Some(NoteTag::Work));
    }

    #[test]
    fn submit_latch_blocks_a_second_enter() {
        let mut form = NoteForm::new();
        form.draft.title = "Standup notes".into();

        assert!(matches!(
            form.begin_submit(),
            Some(FormSubmit::Create(_))
        ));
        assert!(form.submitting);
        assert!(form.begin_submit().is_none(), "latched form must not resubmit");

        form.submit_failed("503 Service Unavailable".into());
        assert!(!form.submitting);
        assert_eq!(form.submit_error.as_deref(), Some("503 Service Unavailable"));
        assert!(form.begin_submit().is_some(), "retry allowed after failure");
    }

    #[test]
    fn invalid_draft_never_latches() {
        let mut form = NoteForm::new();
        form.draft.title = "ab".into();
        assert!(form.begin_submit().is_none());
        assert!(!form.submitting);
        assert_eq!(
            form.error_for(FormField::Title),
            Some("Title must be at least 3 characters")
        );
    }

    #[test]
    fn edit_prefills_and_targets_the_note() {
        let note = Note {
            id: "abc123".into(),
            title: "Plan sprint".into(),
            content: "draft goals".into(),
            tag: NoteTag::Meeting,
            created_at: "2024-05-17T09:30:00.000Z".into(),
            updated_at: "2024-05-17T09:30:00.000Z".into(),
        };
        let mut form = NoteForm::edit(&note);
        assert_eq!(form.draft.title, "Plan sprint");
        assert_eq!(form.draft.tag, "Meeting");

        match form.begin_submit() {
            Some(FormSubmit::Update { id, request }) => {
                assert_eq!(id, "abc123");
                assert_eq!(request.tag, Some(NoteTag::Meeting));
            }
            other => panic!("expected update submit, got {other:?}"),
        }
    }

    #[test]
    fn tag_cycles_through_the_allowed_values() {
        let mut form = NoteForm::new();
        assert_eq!(form.draft.tag, "Todo");
        form.cycle_tag(true);
        assert_eq!(form.draft.tag, "Work");
        form.cycle_tag(false);
        form.cycle_tag(false);
        assert_eq!(form.draft.tag, "Shopping", "cycling wraps at both ends");
    }
}
