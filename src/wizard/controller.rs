//! The staged form controller.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::{FieldKind, FieldRule, StepDefinition, WizardDefinition};
use crate::context::SessionContext;
use crate::error::{AdminError, AdminResult};
use crate::models::{Attachment, Draft, FieldValue, Notice, normalize_id};

use super::compose::{primary_payload, related_payload};
use super::validation::{StepValidator, ValidationErrors, validate_step};

/// Where the form is in its submission lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitState {
    /// Still being filled in, or a previous submit failed.
    #[default]
    Idle,
    /// The primary call is in flight.
    Submitting,
    /// The primary call succeeded.
    Submitted,
}

/// The result of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// The entity as returned by the backend.
    pub entity: Value,
    /// True if the entity was created, false if it was updated.
    pub created: bool,
    /// A success notice, followed by warnings for anything that did not save.
    pub notices: Vec<Notice>,
}

impl SubmissionOutcome {
    /// Returns true if any secondary save failed.
    pub fn has_warnings(&self) -> bool {
        self.notices.iter().any(Notice::is_warning)
    }
}

/// A multi-step form driven by a [`WizardDefinition`].
///
/// Steps are 1-based. Forward navigation is gated on the active step's
/// rules and validators; backward navigation is free; jumping is allowed
/// only to steps that have been completed.
///
/// # Example
///
/// ```no_run
/// use campus_admin::backend::InMemoryBackend;
/// use campus_admin::config::ConfigLoader;
/// use campus_admin::context::{Role, SessionContext};
/// use campus_admin::wizard::StagedForm;
///
/// # async fn run() -> campus_admin::error::AdminResult<()> {
/// let config = ConfigLoader::load("./config/university")?;
/// let context = SessionContext::new("usr_1", Role::Admin);
/// let mut form = StagedForm::new(config.wizard("staff")?, context)?;
///
/// form.set_field("basic", "fullName", "Sam Carter");
/// form.advance()?;
/// let outcome = form.submit(&InMemoryBackend::new()).await?;
/// println!("{:?}", outcome.notices);
/// # Ok(())
/// # }
/// ```
pub struct StagedForm {
    definition: Arc<WizardDefinition>,
    context: SessionContext,
    validators: BTreeMap<usize, Vec<Box<dyn StepValidator>>>,
    step: usize,
    completed_max: usize,
    draft: Draft,
    errors: ValidationErrors,
    attachment: Option<Attachment>,
    entity_id: Option<String>,
    state: SubmitState,
}

impl fmt::Debug for StagedForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedForm")
            .field("kind", &self.definition.kind)
            .field("step", &self.step)
            .field("completed_max", &self.completed_max)
            .field("entity_id", &self.entity_id)
            .field("state", &self.state)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl StagedForm {
    /// Starts an empty form for a new entity.
    ///
    /// Fails with [`AdminError::Forbidden`] if the context's role may not
    /// use the wizard.
    pub fn new(definition: Arc<WizardDefinition>, context: SessionContext) -> AdminResult<Self> {
        if !definition.allows(context.role) {
            return Err(AdminError::Forbidden {
                role: context.role,
                action: format!("use the {} wizard", definition.kind),
            });
        }

        debug!(kind = %definition.kind, actor = %context.actor_id, "Starting wizard");
        Ok(Self {
            definition,
            context,
            validators: BTreeMap::new(),
            step: 1,
            completed_max: 0,
            draft: Draft::new(),
            errors: ValidationErrors::new(),
            attachment: None,
            entity_id: None,
            state: SubmitState::Idle,
        })
    }

    /// Starts a form that edits an existing entity.
    ///
    /// The draft is prefilled from the entity's fields; reference fields are
    /// reduced to their ids and dates to `YYYY-MM-DD`. Every step counts as
    /// completed, so any step can be jumped to.
    pub fn edit(
        definition: Arc<WizardDefinition>,
        context: SessionContext,
        entity: &Value,
    ) -> AdminResult<Self> {
        let id = normalize_id(entity).ok_or_else(|| AdminError::Decode {
            message: format!("{} has no id", definition.entity_label),
        })?;

        let mut form = Self::new(definition, context)?;
        let definition = Arc::clone(&form.definition);
        for step in &definition.steps {
            for rule in &step.fields {
                if let Some(value) = entity.get(&rule.name).and_then(|v| prefill_value(rule, v)) {
                    form.draft.set(&step.section, &rule.name, value);
                }
            }
        }

        form.completed_max = definition.step_count();
        debug!(kind = %definition.kind, id = %id, "Editing entity");
        form.entity_id = Some(id);
        Ok(form)
    }

    /// Replaces the draft wholesale (e.g., one restored from the client).
    pub fn with_draft(mut self, draft: Draft) -> Self {
        self.draft = draft;
        self
    }

    /// Binds an existing entity id, so submit updates instead of creating.
    ///
    /// A blank id binds nothing and the form keeps creating.
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        let id = id.trim();
        self.entity_id = (!id.is_empty()).then(|| id.to_string());
        self
    }

    /// Registers a code validator for a step.
    pub fn with_validator(mut self, step: usize, validator: impl StepValidator + 'static) -> Self {
        self.validators
            .entry(step)
            .or_default()
            .push(Box::new(validator));
        self
    }

    /// The wizard definition.
    pub fn definition(&self) -> &WizardDefinition {
        &self.definition
    }

    /// The session context.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The active step (1-based).
    pub fn step(&self) -> usize {
        self.step
    }

    /// The definition of the active step.
    pub fn active_step(&self) -> Option<&StepDefinition> {
        self.definition.step(self.step)
    }

    /// The total number of steps.
    pub fn step_count(&self) -> usize {
        self.definition.step_count()
    }

    /// The highest step that has passed validation (0 if none).
    pub fn completed_max(&self) -> usize {
        self.completed_max
    }

    /// The current draft.
    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Errors from the last validation.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// The bound entity id, in edit mode or after a create.
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// The attached file, if any.
    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// The submission state.
    pub fn state(&self) -> SubmitState {
        self.state
    }

    /// Sets a field and clears its error.
    pub fn set_field(&mut self, section: &str, field: &str, value: impl Into<FieldValue>) {
        self.draft.set(section, field, value);
        self.errors.remove(field);
    }

    /// Clears a field and its error.
    pub fn clear_field(&mut self, section: &str, field: &str) {
        self.draft.remove(section, field);
        self.errors.remove(field);
    }

    /// Attaches a file, replacing any previous one.
    pub fn attach(&mut self, attachment: Attachment) {
        self.attachment = Some(attachment);
    }

    /// Removes the attached file.
    pub fn detach(&mut self) -> Option<Attachment> {
        self.attachment.take()
    }

    /// Validates one step against the draft without moving.
    ///
    /// Field rules run first, then the step's code validators.
    pub fn check_step(&self, step: usize) -> ValidationErrors {
        let Some(definition) = self.definition.step(step) else {
            return ValidationErrors::new();
        };
        let mut errors = validate_step(definition, &self.draft, &self.context);
        if let Some(validators) = self.validators.get(&step) {
            for validator in validators {
                validator.validate(&self.draft, &self.context, &mut errors);
            }
        }
        errors
    }

    /// Validates the active step and moves forward.
    ///
    /// On failure the errors are kept for display and the step does not
    /// change. On the last step a successful advance marks it completed but
    /// stays put.
    pub fn advance(&mut self) -> AdminResult<usize> {
        let errors = self.check_step(self.step);
        if !errors.is_empty() {
            debug!(
                kind = %self.definition.kind,
                step = self.step,
                invalid = errors.len(),
                "Step validation failed"
            );
            self.errors = errors.clone();
            return Err(AdminError::ValidationFailed {
                step: self.step,
                errors,
            });
        }

        self.errors = ValidationErrors::new();
        self.completed_max = self.completed_max.max(self.step);
        self.step = (self.step + 1).min(self.step_count());
        debug!(kind = %self.definition.kind, step = self.step, "Advanced");
        Ok(self.step)
    }

    /// Moves back one step without validating.
    pub fn retreat(&mut self) -> usize {
        self.step = self.step.saturating_sub(1).max(1);
        self.errors = ValidationErrors::new();
        debug!(kind = %self.definition.kind, step = self.step, "Retreated");
        self.step
    }

    /// Jumps to a completed step.
    pub fn jump_to(&mut self, step: usize) -> AdminResult<usize> {
        if step == 0 || step > self.completed_max {
            return Err(AdminError::StepNotReachable {
                step,
                completed: self.completed_max,
            });
        }
        self.step = step;
        self.errors = ValidationErrors::new();
        debug!(kind = %self.definition.kind, step, "Jumped");
        Ok(step)
    }

    /// Validates every step and saves the entity.
    ///
    /// Makes exactly one create or update call. If the wizard declares a
    /// related record it is upserted next; a failure there is reported as a
    /// warning and does not undo the primary save. A form that is
    /// submitting or already submitted returns [`AdminError::AlreadySubmitted`]
    /// without calling the backend.
    ///
    /// If the primary call fails the form stays on the last step with its
    /// draft intact and can be submitted again.
    pub async fn submit(&mut self, backend: &dyn Backend) -> AdminResult<SubmissionOutcome> {
        if self.state != SubmitState::Idle {
            debug!(kind = %self.definition.kind, state = ?self.state, "Ignoring repeated submit");
            return Err(AdminError::AlreadySubmitted);
        }

        for step in 1..=self.step_count() {
            let errors = self.check_step(step);
            if !errors.is_empty() {
                self.step = step;
                self.errors = errors.clone();
                return Err(AdminError::ValidationFailed { step, errors });
            }
            self.completed_max = self.completed_max.max(step);
        }
        self.errors = ValidationErrors::new();

        self.state = SubmitState::Submitting;
        let definition = Arc::clone(&self.definition);
        let payload = primary_payload(&definition, &self.draft, self.attachment.as_ref());

        let result = match &self.entity_id {
            Some(id) => backend
                .update(&definition.resource, id, payload)
                .await
                .map(|entity| (entity, false)),
            None => backend
                .create(&definition.resource, payload)
                .await
                .map(|entity| (entity, true)),
        };

        let (entity, created) = match result {
            Ok(saved) => saved,
            Err(e) => {
                warn!(kind = %definition.kind, error = %e, "Submission failed");
                self.state = SubmitState::Idle;
                self.step = self.step_count();
                return Err(e);
            }
        };

        let entity_id = normalize_id(&entity).or_else(|| self.entity_id.clone());
        info!(
            kind = %definition.kind,
            actor = %self.context.actor_id,
            id = entity_id.as_deref().unwrap_or("<none>"),
            created,
            "Entity saved"
        );

        let verb = if created { "created" } else { "updated" };
        let mut notices = vec![Notice::success(format!(
            "{} {verb} successfully",
            definition.entity_label
        ))];

        if let Some(related) = &definition.related {
            match &entity_id {
                Some(id) => {
                    let payload = related_payload(&definition, related, &self.draft, id);
                    if let Err(e) = backend.upsert(&related.resource, id, payload).await {
                        warn!(
                            kind = %definition.kind,
                            related = %related.label,
                            error = %e,
                            "Related record not saved"
                        );
                        notices.push(Notice::warning(format!(
                            "{} saved, but {} could not be saved: {}",
                            definition.entity_label, related.label, e
                        )));
                    }
                }
                None => {
                    warn!(kind = %definition.kind, "Backend returned no id; related record skipped");
                    notices.push(Notice::warning(format!(
                        "{} saved, but {} could not be saved: no id returned",
                        definition.entity_label, related.label
                    )));
                }
            }
        }

        self.draft.clear();
        self.attachment = None;
        self.entity_id = entity_id;
        self.state = SubmitState::Submitted;

        Ok(SubmissionOutcome {
            entity,
            created,
            notices,
        })
    }
}

/// Converts an entity field into a draft value for its rule.
fn prefill_value(rule: &FieldRule, value: &Value) -> Option<FieldValue> {
    if value.is_null() {
        return None;
    }
    match rule.kind {
        FieldKind::Reference => normalize_id(value).map(FieldValue::Text),
        FieldKind::Date => {
            let text = value.as_str()?;
            let date = text.get(..10).unwrap_or(text);
            Some(
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map(FieldValue::Date)
                    .unwrap_or_else(|_| FieldValue::Text(text.to_string())),
            )
        }
        _ => Some(FieldValue::from(value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryBackend, Operation};
    use crate::config::{FieldKind, FieldRule, RelatedEntity};
    use crate::context::Role;
    use crate::models::NoticeLevel;
    use proptest::prelude::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn admin() -> SessionContext {
        SessionContext::on("usr_admin", Role::Admin, today())
    }

    fn student_definition() -> Arc<WizardDefinition> {
        Arc::new(WizardDefinition {
            kind: "student".to_string(),
            title: "Add Student".to_string(),
            entity_label: "Student".to_string(),
            resource: "/user/students".to_string(),
            roles: vec![Role::Admin, Role::Moderator],
            steps: vec![
                StepDefinition {
                    title: "Basic information".to_string(),
                    section: "basic".to_string(),
                    fields: vec![
                        FieldRule::new("fullName", "Full name", FieldKind::Text).required(),
                        FieldRule::new("email", "Email", FieldKind::Email).required(),
                        FieldRule::new("batch", "Batch", FieldKind::Reference).required(),
                        FieldRule::new("admissionDate", "Admission date", FieldKind::Date)
                            .required(),
                    ],
                },
                StepDefinition {
                    title: "Profile".to_string(),
                    section: "profile".to_string(),
                    fields: vec![FieldRule::new("bloodGroup", "Blood group", FieldKind::Text)],
                },
                StepDefinition {
                    title: "Guardian".to_string(),
                    section: "kin".to_string(),
                    fields: vec![FieldRule::new("guardianName", "Guardian name", FieldKind::Text)],
                },
            ],
            related: Some(RelatedEntity {
                label: "Profile".to_string(),
                resource: "/user/student-profiles".to_string(),
                sections: vec!["profile".to_string(), "kin".to_string()],
                link_field: "student".to_string(),
            }),
            attachment_field: Some("profilePicture".to_string()),
        })
    }

    fn fill_basic(form: &mut StagedForm) {
        form.set_field("basic", "fullName", "Jane Doe");
        form.set_field("basic", "email", "jane@example.com");
        form.set_field("basic", "admissionDate", "2024-01-10");
        form.set_field("basic", "batch", "batch_cse_24");
    }

    #[test]
    fn test_role_not_allowed_is_forbidden() {
        let context = SessionContext::on("usr_t", Role::Teacher, today());
        let result = StagedForm::new(student_definition(), context);
        assert!(matches!(result, Err(AdminError::Forbidden { role: Role::Teacher, .. })));
    }

    #[test]
    fn test_advance_blocked_by_invalid_step() {
        let mut form = StagedForm::new(student_definition(), admin()).unwrap();
        form.set_field("basic", "fullName", "Jane Doe");

        let result = form.advance();
        assert!(matches!(result, Err(AdminError::ValidationFailed { step: 1, .. })));
        assert_eq!(form.step(), 1);
        assert_eq!(form.completed_max(), 0);
        assert_eq!(form.errors().get("email"), Some("Email is required"));
    }

    #[test]
    fn test_set_field_clears_its_error() {
        let mut form = StagedForm::new(student_definition(), admin()).unwrap();
        let _ = form.advance();
        assert!(form.errors().contains("email"));

        form.set_field("basic", "email", "jane@example.com");
        assert!(!form.errors().contains("email"));
        assert!(form.errors().contains("fullName"));
    }

    #[test]
    fn test_advance_retreat_and_jump() {
        let mut form = StagedForm::new(student_definition(), admin()).unwrap();
        fill_basic(&mut form);

        assert_eq!(form.advance().unwrap(), 2);
        assert_eq!(form.completed_max(), 1);
        assert!(matches!(
            form.jump_to(2),
            Err(AdminError::StepNotReachable { step: 2, completed: 1 })
        ));

        assert_eq!(form.advance().unwrap(), 3);
        assert_eq!(form.advance().unwrap(), 3);
        assert_eq!(form.completed_max(), 3);

        assert_eq!(form.retreat(), 2);
        assert_eq!(form.retreat(), 1);
        assert_eq!(form.retreat(), 1);
        assert_eq!(form.jump_to(3).unwrap(), 3);
        assert!(form.jump_to(0).is_err());
    }

    #[test]
    fn test_code_validator_blocks_advance() {
        let mut form = StagedForm::new(student_definition(), admin())
            .unwrap()
            .with_validator(
                1,
                |draft: &Draft, _: &SessionContext, errors: &mut ValidationErrors| {
                    if draft
                        .get("basic", "email")
                        .and_then(FieldValue::as_text)
                        .is_some_and(|e| !e.ends_with("@example.com"))
                    {
                        errors.insert("email", "Use a campus address");
                    }
                },
            );
        fill_basic(&mut form);
        form.set_field("basic", "email", "jane@elsewhere.org");

        assert!(form.advance().is_err());
        assert_eq!(form.errors().get("email"), Some("Use a campus address"));
    }

    #[tokio::test]
    async fn test_new_student_submission() {
        let backend = InMemoryBackend::new();
        let mut form = StagedForm::new(student_definition(), admin()).unwrap();
        fill_basic(&mut form);

        let outcome = form.submit(&backend).await.unwrap();
        assert!(outcome.created);
        assert!(!outcome.has_warnings());

        let creates = backend.calls_of(Operation::Create);
        assert_eq!(creates.len(), 1);
        let fields = creates[0].fields.as_ref().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields["fullName"], "Jane Doe");
        assert_eq!(fields["email"], "jane@example.com");
        assert_eq!(fields["admissionDate"], "2024-01-10");
        assert_eq!(fields["batch"], "batch_cse_24");

        let upserts = backend.calls_of(Operation::Upsert);
        assert_eq!(upserts.len(), 1);
        let id = outcome.entity["id"].as_str().unwrap();
        assert_eq!(upserts[0].target, format!("/user/student-profiles/{id}"));
        assert_eq!(upserts[0].fields.as_ref().unwrap()["student"], id);

        assert!(form.draft().is_empty());
        assert_eq!(form.state(), SubmitState::Submitted);
    }

    #[tokio::test]
    async fn test_blank_entity_id_still_creates() {
        let backend = InMemoryBackend::new();
        let mut form = StagedForm::new(student_definition(), admin())
            .unwrap()
            .with_entity_id("");
        assert_eq!(form.entity_id(), None);
        fill_basic(&mut form);

        let outcome = form.submit(&backend).await.unwrap();
        assert!(outcome.created);
        assert!(backend.calls_of(Operation::Update).is_empty());
    }

    #[tokio::test]
    async fn test_related_failure_is_warning() {
        let backend = InMemoryBackend::new();
        backend.fail_on(Operation::Upsert, None, 500, "Profile service unavailable");
        let mut form = StagedForm::new(student_definition(), admin()).unwrap();
        fill_basic(&mut form);

        let outcome = form.submit(&backend).await.unwrap();
        assert_eq!(outcome.notices[0].level, NoticeLevel::Success);
        assert!(outcome.has_warnings());
        assert_eq!(backend.calls_of(Operation::Create).len(), 1);
        assert_eq!(backend.calls_of(Operation::Upsert).len(), 1);
    }

    #[tokio::test]
    async fn test_double_submit_makes_one_primary_call() {
        let backend = InMemoryBackend::new();
        let mut form = StagedForm::new(student_definition(), admin()).unwrap();
        fill_basic(&mut form);

        assert!(form.submit(&backend).await.is_ok());
        assert!(matches!(form.submit(&backend).await, Err(AdminError::AlreadySubmitted)));
        assert!(matches!(form.submit(&backend).await, Err(AdminError::AlreadySubmitted)));
        assert_eq!(backend.calls_of(Operation::Create).len(), 1);
    }

    #[tokio::test]
    async fn test_submit_jumps_to_first_invalid_step() {
        let backend = InMemoryBackend::new();
        let mut form = StagedForm::new(student_definition(), admin()).unwrap();
        fill_basic(&mut form);
        form.advance().unwrap();
        form.advance().unwrap();
        form.set_field("basic", "email", "not-an-email");

        let result = form.submit(&backend).await;
        assert!(matches!(result, Err(AdminError::ValidationFailed { step: 1, .. })));
        assert_eq!(form.step(), 1);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_primary_failure_keeps_draft_and_allows_retry() {
        let backend = InMemoryBackend::new();
        backend.fail_on(Operation::Create, None, 503, "Service unavailable");
        let mut form = StagedForm::new(student_definition(), admin()).unwrap();
        fill_basic(&mut form);

        let result = form.submit(&backend).await;
        assert!(matches!(result, Err(AdminError::Backend { status: 503, .. })));
        assert_eq!(form.step(), 3);
        assert_eq!(form.state(), SubmitState::Idle);
        assert!(!form.draft().is_empty());
        assert!(backend.calls_of(Operation::Upsert).is_empty());

        backend.clear_failures();
        assert!(form.submit(&backend).await.is_ok());
        assert_eq!(backend.calls_of(Operation::Create).len(), 2);
    }

    #[tokio::test]
    async fn test_attachment_makes_multipart_create() {
        let backend = InMemoryBackend::new();
        let mut form = StagedForm::new(student_definition(), admin()).unwrap();
        fill_basic(&mut form);
        form.attach(Attachment::new("jane.png", "image/png", vec![1, 2, 3]));

        let outcome = form.submit(&backend).await.unwrap();
        assert!(backend.calls_of(Operation::Create)[0].multipart);
        assert_eq!(outcome.entity["profilePicture"], "jane.png");
        assert!(form.attachment().is_none());
    }

    #[tokio::test]
    async fn test_edit_prefills_and_updates() {
        let backend = InMemoryBackend::new();
        let entity = json!({
            "id": "stu_9",
            "fullName": "Jane Doe",
            "email": "jane@example.com",
            "batch": {"_id": "batch_cse_24", "name": "CSE 24"},
            "admissionDate": "2024-01-10T00:00:00.000Z",
            "bloodGroup": null
        });
        backend.insert("/user/students", entity.clone());

        let mut form = StagedForm::edit(student_definition(), admin(), &entity).unwrap();
        assert_eq!(form.entity_id(), Some("stu_9"));
        assert_eq!(
            form.draft().get("basic", "batch"),
            Some(&FieldValue::Text("batch_cse_24".to_string()))
        );
        assert_eq!(
            form.draft().get("basic", "admissionDate"),
            Some(&FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()))
        );
        assert!(form.draft().get("profile", "bloodGroup").is_none());
        assert_eq!(form.jump_to(3).unwrap(), 3);

        form.set_field("basic", "fullName", "Jane Smith");
        let outcome = form.submit(&backend).await.unwrap();
        assert!(!outcome.created);
        assert!(backend.calls_of(Operation::Create).is_empty());
        assert_eq!(backend.calls_of(Operation::Update)[0].target, "/user/students/stu_9");
        assert_eq!(
            backend.entity("/user/students", "stu_9").unwrap()["fullName"],
            "Jane Smith"
        );
    }

    #[derive(Debug, Clone)]
    enum Nav {
        Advance,
        Retreat,
        Jump(usize),
        Fill,
        Break,
    }

    fn nav() -> impl Strategy<Value = Nav> {
        prop_oneof![
            Just(Nav::Advance),
            Just(Nav::Retreat),
            (0usize..5).prop_map(Nav::Jump),
            Just(Nav::Fill),
            Just(Nav::Break),
        ]
    }

    proptest! {
        #[test]
        fn prop_navigation_invariants(ops in proptest::collection::vec(nav(), 0..40)) {
            let mut form = StagedForm::new(student_definition(), admin()).unwrap();
            for op in ops {
                let before = form.step();
                let completed_before = form.completed_max();
                match op {
                    Nav::Advance => {
                        let invalid = !form.check_step(before).is_empty();
                        let result = form.advance();
                        if invalid {
                            prop_assert!(result.is_err());
                            prop_assert_eq!(form.step(), before);
                        } else {
                            prop_assert_eq!(form.step(), (before + 1).min(3));
                        }
                    }
                    Nav::Retreat => {
                        form.retreat();
                        prop_assert_eq!(form.step(), before.saturating_sub(1).max(1));
                    }
                    Nav::Jump(target) => {
                        let result = form.jump_to(target);
                        if target == 0 || target > completed_before {
                            prop_assert!(result.is_err());
                            prop_assert_eq!(form.step(), before);
                        } else {
                            prop_assert_eq!(form.step(), target);
                        }
                    }
                    Nav::Fill => fill_basic(&mut form),
                    Nav::Break => form.clear_field("basic", "email"),
                }
                prop_assert!((1..=3).contains(&form.step()));
                prop_assert!(form.completed_max() <= 3);
            }
        }
    }
}
