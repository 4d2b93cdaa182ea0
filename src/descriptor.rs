//! Resource descriptors: the table-driven map from resource name to its
//! CRUD contract.
//!
//! The four endpoint families expose near-identical CRUD surfaces that
//! differ only in table/field names, envelope shape, and a handful of
//! per-resource messages and status quirks. All of that variation lives
//! here as data; `handlers::gateway` interprets it.

use std::collections::HashMap;

/// Which JSON wrapper a resource family emits.
///
/// Existing front-end consumers depend on the exact shape, so this is part
/// of the per-resource contract, not a presentation choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeShape {
    /// `{"success": bool, "message"?, "data"?}` (students, weekly).
    SuccessFlag,
    /// `{"status": "success"|"info"|"error", "message"?, "data"?}`
    /// (assignments, discussion).
    StatusTag,
}

/// How a list response is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListStyle {
    /// Bare JSON array, no envelope (assignments list).
    Plain,
    /// Envelope with `data`.
    Data,
    /// Envelope with `count` and `data` (assignment comments).
    DataWithCount,
}

/// Status code contract for a successful delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteStyle {
    /// 204, empty body (students).
    NoContent,
    /// 200 with a JSON success envelope.
    JsonMessage,
}

/// Primary lookup key for a resource.
#[derive(Clone, Copy, Debug)]
pub enum KeySpec {
    /// Storage-internal integer `id`.
    Surrogate,
    /// Client-supplied unique text key (e.g. `week_id`, `topic_id`).
    External(&'static str),
}

impl KeySpec {
    pub fn column(&self) -> &'static str {
        match self {
            KeySpec::Surrogate => "id",
            KeySpec::External(col) => col,
        }
    }

    pub fn is_surrogate(&self) -> bool {
        matches!(self, KeySpec::Surrogate)
    }
}

/// Validation/transform class of one writable field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text; sanitized before storage.
    Text,
    /// Sanitized and checked against the email grammar.
    Email,
    /// Exact YYYY-MM-DD, round-trip validated, bound with a `::date` cast.
    Date,
    /// Integer (parent foreign keys on surrogate-keyed tables).
    Int,
    /// JSON array stored as JSONB; any non-array input collapses to `[]`.
    JsonList,
    /// Hashed with Argon2 before storage; never selected back.
    Password,
}

impl FieldKind {
    /// SQL cast appended to the placeholder, for types that cannot bind
    /// from their text form.
    pub fn cast(&self) -> Option<&'static str> {
        match self {
            FieldKind::Date => Some("date"),
            FieldKind::JsonList => Some("jsonb"),
            _ => None,
        }
    }
}

/// One writable field of a resource.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Required on create.
    pub required: bool,
    /// Accepted by partial update.
    pub updatable: bool,
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind, required: bool, updatable: bool) -> Self {
        FieldSpec { name, kind, required, updatable }
    }
}

/// Parent existence requirement for child resources (comments, replies).
#[derive(Clone, Copy, Debug)]
pub struct ParentRef {
    pub table: &'static str,
    /// Column on the parent table matched against the foreign key value.
    pub key_column: &'static str,
    /// Field carrying the parent key in bodies and list queries.
    pub fk_field: &'static str,
    /// Whether the foreign key is an integer (surrogate parent) or text.
    pub fk_is_int: bool,
    pub missing_message: &'static str,
    pub list_param_message: &'static str,
}

/// Dependent rows removed before deleting a parent record.
#[derive(Clone, Copy, Debug)]
pub struct ChildCascade {
    pub table: &'static str,
    pub fk_column: &'static str,
}

/// Sort allow-list. Anything outside it silently falls back to the default
/// column; order accepts only asc/desc (case-insensitive).
#[derive(Clone, Copy, Debug)]
pub struct SortSpec {
    pub allowed: &'static [&'static str],
    pub default_column: &'static str,
    pub default_desc: bool,
}

impl SortSpec {
    /// Resolve user-supplied sort/order into safe tokens. These are the only
    /// strings ever interpolated into SQL.
    pub fn resolve(&self, sort: Option<&str>, order: Option<&str>) -> (&'static str, &'static str) {
        let column = sort
            .and_then(|s| self.allowed.iter().find(|a| **a == s))
            .copied()
            .unwrap_or(self.default_column);
        let direction = match order.map(|o| o.to_ascii_lowercase()) {
            Some(o) if o == "asc" => "ASC",
            Some(o) if o == "desc" => "DESC",
            _ => {
                if self.default_desc {
                    "DESC"
                } else {
                    "ASC"
                }
            }
        };
        (column, direction)
    }
}

/// Per-resource response wording. Message text is part of the observable
/// contract, so it is configured rather than generated.
#[derive(Clone, Copy, Debug, Default)]
pub struct Messages {
    pub fetched_many: Option<&'static str>,
    pub fetched_one: Option<&'static str>,
    pub created: Option<&'static str>,
    pub updated: &'static str,
    pub unchanged: &'static str,
    pub deleted: &'static str,
    pub not_found: &'static str,
    pub missing_fields: &'static str,
    pub nothing_to_update: &'static str,
    pub conflict: &'static str,
    pub update_id_required: &'static str,
    pub delete_id_required: &'static str,
    pub bad_date: &'static str,
}

/// Everything the generic gateway needs to serve one resource.
#[derive(Clone, Debug)]
pub struct ResourceDescriptor {
    /// Value of the `resource` query parameter that selects this descriptor.
    pub name: &'static str,
    pub table: &'static str,
    pub key: KeySpec,
    /// Query parameter carrying the key for get/delete (`id`, or `week_id`
    /// for weeks).
    pub id_param: &'static str,
    /// Columns selected and returned. Sensitive columns (password) are
    /// simply never listed here.
    pub columns: &'static [&'static str],
    /// Columns holding JSON arrays, coalesced to `[]` on read.
    pub json_columns: &'static [&'static str],
    pub search_columns: &'static [&'static str],
    pub sort: SortSpec,
    pub fields: &'static [FieldSpec],
    /// Columns checked (OR-combined) for duplicates before insert.
    pub unique: &'static [&'static str],
    pub parent: Option<ParentRef>,
    pub cascade: Option<ChildCascade>,
    pub shape: EnvelopeShape,
    pub list_style: ListStyle,
    pub delete_style: DeleteStyle,
    /// Re-fetch and return the record after a successful update.
    pub refetch_on_update: bool,
    /// Whether PUT is part of this resource's contract.
    pub updatable: bool,
    /// Set `updated_at = NOW()` on update.
    pub bump_updated_at: bool,
    /// Students only: skip the existence check on delete and report success
    /// regardless of rows affected. Clients treat delete as idempotent.
    pub unchecked_delete: bool,
    pub messages: Messages,
}

impl ResourceDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One mounted endpoint: a set of resources routed by the `resource` query
/// parameter.
#[derive(Clone, Debug)]
pub struct GatewayFamily {
    pub name: &'static str,
    pub shape: EnvelopeShape,
    pub default_resource: Option<&'static str>,
    pub invalid_resource_message: &'static str,
    resources: HashMap<&'static str, ResourceDescriptor>,
}

impl GatewayFamily {
    fn new(
        name: &'static str,
        shape: EnvelopeShape,
        default_resource: Option<&'static str>,
        invalid_resource_message: &'static str,
        resources: Vec<ResourceDescriptor>,
    ) -> Self {
        GatewayFamily {
            name,
            shape,
            default_resource,
            invalid_resource_message,
            resources: resources.into_iter().map(|d| (d.name, d)).collect(),
        }
    }

    /// Resolve the `resource` query parameter to a descriptor, applying the
    /// family default when the parameter is absent.
    pub fn resource(&self, name: Option<&str>) -> Option<&ResourceDescriptor> {
        match name.or(self.default_resource) {
            Some(n) => self.resources.get(n),
            None => None,
        }
    }
}

/// All families, built once at startup and shared through `AppState`.
#[derive(Clone, Debug)]
pub struct Registry {
    pub students: GatewayFamily,
    pub assignments: GatewayFamily,
    pub discussion: GatewayFamily,
    pub weekly: GatewayFamily,
}

impl Registry {
    pub fn builtin() -> Self {
        Registry {
            students: students_family(),
            assignments: assignments_family(),
            discussion: discussion_family(),
            weekly: weekly_family(),
        }
    }
}

const STUDENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("student_id", FieldKind::Text, true, false),
    FieldSpec::new("name", FieldKind::Text, true, true),
    FieldSpec::new("email", FieldKind::Email, true, true),
    FieldSpec::new("password", FieldKind::Password, true, false),
];

const ASSIGNMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("title", FieldKind::Text, true, true),
    FieldSpec::new("description", FieldKind::Text, true, true),
    FieldSpec::new("due_date", FieldKind::Date, true, true),
    FieldSpec::new("files", FieldKind::JsonList, false, true),
];

const ASSIGNMENT_COMMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("assignment_id", FieldKind::Int, true, false),
    FieldSpec::new("author", FieldKind::Text, true, false),
    FieldSpec::new("text", FieldKind::Text, true, false),
];

const TOPIC_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("topic_id", FieldKind::Text, true, false),
    FieldSpec::new("subject", FieldKind::Text, true, true),
    FieldSpec::new("message", FieldKind::Text, true, true),
    FieldSpec::new("author", FieldKind::Text, true, false),
];

const REPLY_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("reply_id", FieldKind::Text, true, false),
    FieldSpec::new("topic_id", FieldKind::Text, true, false),
    FieldSpec::new("text", FieldKind::Text, true, false),
    FieldSpec::new("author", FieldKind::Text, true, false),
];

const WEEK_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("week_id", FieldKind::Text, true, false),
    FieldSpec::new("title", FieldKind::Text, true, true),
    FieldSpec::new("start_date", FieldKind::Date, true, true),
    FieldSpec::new("description", FieldKind::Text, true, true),
    FieldSpec::new("links", FieldKind::JsonList, false, true),
];

const WEEK_COMMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("week_id", FieldKind::Text, true, false),
    FieldSpec::new("author", FieldKind::Text, true, false),
    FieldSpec::new("text", FieldKind::Text, true, false),
];

fn students_family() -> GatewayFamily {
    let students = ResourceDescriptor {
        name: "students",
        table: "students",
        key: KeySpec::Surrogate,
        id_param: "id",
        columns: &["id", "student_id", "name", "email", "created_at"],
        json_columns: &[],
        search_columns: &["name", "student_id", "email"],
        sort: SortSpec {
            allowed: &["name", "student_id", "email", "id"],
            default_column: "name",
            default_desc: false,
        },
        fields: STUDENT_FIELDS,
        unique: &["student_id", "email"],
        parent: None,
        cascade: None,
        shape: EnvelopeShape::SuccessFlag,
        list_style: ListStyle::Data,
        delete_style: DeleteStyle::NoContent,
        refetch_on_update: false,
        updatable: true,
        bump_updated_at: false,
        unchecked_delete: true,
        messages: Messages {
            created: Some("Student created successfully"),
            updated: "Student updated successfully",
            unchanged: "Student updated successfully",
            deleted: "",
            not_found: "Student not found",
            missing_fields: "All fields are required",
            nothing_to_update: "No fields to update",
            conflict: "Student ID or Email already exists",
            update_id_required: "id required",
            delete_id_required: "id required",
            bad_date: "",
            ..Default::default()
        },
    };
    GatewayFamily::new(
        "students",
        EnvelopeShape::SuccessFlag,
        Some("students"),
        "Invalid resource",
        vec![students],
    )
}

fn assignments_family() -> GatewayFamily {
    let assignments = ResourceDescriptor {
        name: "assignments",
        table: "assignments",
        key: KeySpec::Surrogate,
        id_param: "id",
        columns: &["id", "title", "description", "due_date", "files", "created_at", "updated_at"],
        json_columns: &["files"],
        search_columns: &["title", "description"],
        sort: SortSpec {
            allowed: &["title", "due_date", "created_at"],
            default_column: "created_at",
            default_desc: false,
        },
        fields: ASSIGNMENT_FIELDS,
        unique: &[],
        parent: None,
        cascade: Some(ChildCascade {
            table: "assignment_comments",
            fk_column: "assignment_id",
        }),
        shape: EnvelopeShape::StatusTag,
        list_style: ListStyle::Plain,
        delete_style: DeleteStyle::JsonMessage,
        refetch_on_update: false,
        updatable: true,
        bump_updated_at: true,
        unchecked_delete: false,
        messages: Messages {
            updated: "Assignment updated successfully.",
            unchanged: "No changes were made to the assignment.",
            deleted: "Assignment deleted successfully.",
            not_found: "Assignment not found",
            missing_fields: "Title, description, and due date are required.",
            nothing_to_update: "No fields provided to update",
            conflict: "",
            update_id_required: "Assignment ID is required",
            delete_id_required: "Assignment ID is required",
            bad_date: "Invalid due_date format. Use YYYY-MM-DD.",
            ..Default::default()
        },
    };
    let comments = ResourceDescriptor {
        name: "comments",
        table: "assignment_comments",
        key: KeySpec::Surrogate,
        id_param: "id",
        columns: &["id", "assignment_id", "author", "text", "created_at"],
        json_columns: &[],
        search_columns: &[],
        sort: SortSpec {
            allowed: &[],
            default_column: "created_at",
            default_desc: false,
        },
        fields: ASSIGNMENT_COMMENT_FIELDS,
        unique: &[],
        parent: Some(ParentRef {
            table: "assignments",
            key_column: "id",
            fk_field: "assignment_id",
            fk_is_int: true,
            missing_message: "Assignment not found",
            list_param_message: "Assignment ID is required",
        }),
        cascade: None,
        shape: EnvelopeShape::StatusTag,
        list_style: ListStyle::DataWithCount,
        delete_style: DeleteStyle::JsonMessage,
        refetch_on_update: false,
        updatable: false,
        bump_updated_at: false,
        unchecked_delete: false,
        messages: Messages {
            deleted: "Comment deleted successfully",
            not_found: "Comment not found",
            missing_fields: "All fields (assignment_id, author, text) are required",
            delete_id_required: "Comment ID is required",
            ..Default::default()
        },
    };
    GatewayFamily::new(
        "assignments",
        EnvelopeShape::StatusTag,
        None,
        "Invalid resource. Use 'assignments' or 'comments'",
        vec![assignments, comments],
    )
}

fn discussion_family() -> GatewayFamily {
    let topics = ResourceDescriptor {
        name: "topics",
        table: "topics",
        key: KeySpec::External("topic_id"),
        id_param: "id",
        columns: &["topic_id", "subject", "message", "author", "created_at"],
        json_columns: &[],
        search_columns: &["subject", "message"],
        sort: SortSpec {
            allowed: &["subject", "author", "created_at"],
            default_column: "created_at",
            default_desc: true,
        },
        fields: TOPIC_FIELDS,
        unique: &["topic_id"],
        parent: None,
        cascade: Some(ChildCascade {
            table: "replies",
            fk_column: "topic_id",
        }),
        shape: EnvelopeShape::StatusTag,
        list_style: ListStyle::Data,
        delete_style: DeleteStyle::JsonMessage,
        refetch_on_update: false,
        updatable: true,
        bump_updated_at: false,
        unchecked_delete: false,
        messages: Messages {
            updated: "Topic updated successfully",
            unchanged: "No changes made to the topic",
            deleted: "Topic and associated replies deleted successfully",
            not_found: "Topic not found",
            missing_fields: "topic_id, subject, message, and author are required",
            nothing_to_update: "No fields to update",
            conflict: "topic_id already exists",
            update_id_required: "topic_id is required",
            delete_id_required: "topic_id is required",
            ..Default::default()
        },
    };
    let replies = ResourceDescriptor {
        name: "replies",
        table: "replies",
        key: KeySpec::External("reply_id"),
        id_param: "id",
        columns: &["reply_id", "topic_id", "text", "author", "created_at"],
        json_columns: &[],
        search_columns: &[],
        sort: SortSpec {
            allowed: &[],
            default_column: "created_at",
            default_desc: false,
        },
        fields: REPLY_FIELDS,
        unique: &["reply_id"],
        parent: Some(ParentRef {
            table: "topics",
            key_column: "topic_id",
            fk_field: "topic_id",
            fk_is_int: false,
            missing_message: "Parent topic not found",
            list_param_message: "topic_id parameter is required",
        }),
        cascade: None,
        shape: EnvelopeShape::StatusTag,
        list_style: ListStyle::Data,
        delete_style: DeleteStyle::JsonMessage,
        refetch_on_update: false,
        updatable: false,
        bump_updated_at: false,
        unchecked_delete: false,
        messages: Messages {
            deleted: "Reply deleted successfully",
            not_found: "Reply not found",
            missing_fields: "reply_id, topic_id, text, and author are required",
            conflict: "reply_id already exists",
            delete_id_required: "reply_id is required",
            ..Default::default()
        },
    };
    GatewayFamily::new(
        "discussion",
        EnvelopeShape::StatusTag,
        None,
        "Invalid resource",
        vec![topics, replies],
    )
}

fn weekly_family() -> GatewayFamily {
    let weeks = ResourceDescriptor {
        name: "weeks",
        table: "weeks",
        key: KeySpec::External("week_id"),
        id_param: "week_id",
        columns: &["week_id", "title", "start_date", "description", "links", "created_at", "updated_at"],
        json_columns: &["links"],
        search_columns: &["title", "description"],
        sort: SortSpec {
            allowed: &["title", "start_date", "created_at"],
            default_column: "start_date",
            default_desc: false,
        },
        fields: WEEK_FIELDS,
        unique: &["week_id"],
        parent: None,
        cascade: Some(ChildCascade {
            table: "week_comments",
            fk_column: "week_id",
        }),
        shape: EnvelopeShape::SuccessFlag,
        list_style: ListStyle::Data,
        delete_style: DeleteStyle::JsonMessage,
        refetch_on_update: true,
        updatable: true,
        bump_updated_at: true,
        unchecked_delete: false,
        messages: Messages {
            fetched_many: Some("weeks fetched successfully"),
            fetched_one: Some("Week fetched"),
            created: Some("Week created"),
            updated: "Week updated",
            unchanged: "Week updated",
            deleted: "Week and associated comments deleted",
            not_found: "Week not found",
            missing_fields: "Missing required fields: week_id, title, start_date, description",
            nothing_to_update: "No fields to update",
            conflict: "week_id already exists",
            update_id_required: "week_id is required to update",
            delete_id_required: "week_id is required to delete",
            bad_date: "start_date must be in YYYY-MM-DD format",
        },
    };
    let comments = ResourceDescriptor {
        name: "comments",
        table: "week_comments",
        key: KeySpec::Surrogate,
        id_param: "id",
        columns: &["id", "week_id", "author", "text", "created_at"],
        json_columns: &[],
        search_columns: &[],
        sort: SortSpec {
            allowed: &[],
            default_column: "created_at",
            default_desc: false,
        },
        fields: WEEK_COMMENT_FIELDS,
        unique: &[],
        parent: Some(ParentRef {
            table: "weeks",
            key_column: "week_id",
            fk_field: "week_id",
            fk_is_int: false,
            missing_message: "Referenced week not found",
            list_param_message: "week_id is required to fetch comments",
        }),
        cascade: None,
        shape: EnvelopeShape::SuccessFlag,
        list_style: ListStyle::Data,
        delete_style: DeleteStyle::JsonMessage,
        refetch_on_update: false,
        updatable: false,
        bump_updated_at: false,
        unchecked_delete: false,
        messages: Messages {
            fetched_many: Some("Comments fetched"),
            created: Some("Comment created"),
            deleted: "Comment deleted",
            not_found: "Comment not found",
            missing_fields: "Missing required fields: week_id, author, text",
            delete_id_required: "Comment id is required",
            ..Default::default()
        },
    };
    GatewayFamily::new(
        "weekly",
        EnvelopeShape::SuccessFlag,
        Some("weeks"),
        "Invalid resource. Use 'weeks' or 'comments'",
        vec![weeks, comments],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_resolves_resources_and_default() {
        let reg = Registry::builtin();
        assert!(reg.weekly.resource(None).is_some_and(|d| d.name == "weeks"));
        assert!(reg.weekly.resource(Some("comments")).is_some_and(|d| d.table == "week_comments"));
        assert!(reg.assignments.resource(None).is_none());
        assert!(reg.assignments.resource(Some("bogus")).is_none());
        assert!(reg.discussion.resource(Some("replies")).is_some());
    }

    #[test]
    fn comment_tables_are_distinct_per_family() {
        let reg = Registry::builtin();
        let a = reg.assignments.resource(Some("comments")).unwrap();
        let w = reg.weekly.resource(Some("comments")).unwrap();
        assert_ne!(a.table, w.table);
    }

    #[test]
    fn sort_resolution_falls_back_on_injection() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        let (col, dir) = weeks.sort.resolve(Some("1;DROP TABLE weeks"), Some("desc"));
        assert_eq!(col, "start_date");
        assert_eq!(dir, "DESC");
        let (col, dir) = weeks.sort.resolve(Some("title"), Some("sideways"));
        assert_eq!(col, "title");
        assert_eq!(dir, "ASC");
    }

    #[test]
    fn topics_default_to_newest_first() {
        let reg = Registry::builtin();
        let topics = reg.discussion.resource(Some("topics")).unwrap();
        let (col, dir) = topics.sort.resolve(None, None);
        assert_eq!((col, dir), ("created_at", "DESC"));
        // case-insensitive order token
        let (_, dir) = topics.sort.resolve(None, Some("ASC"));
        assert_eq!(dir, "ASC");
    }

    #[test]
    fn field_tables_cover_every_resource() {
        let reg = Registry::builtin();
        let expected: &[(&GatewayFamily, &str, usize)] = &[
            (&reg.students, "students", 4),
            (&reg.assignments, "assignments", 4),
            (&reg.assignments, "comments", 3),
            (&reg.discussion, "topics", 4),
            (&reg.discussion, "replies", 4),
            (&reg.weekly, "weeks", 5),
            (&reg.weekly, "comments", 3),
        ];
        for (family, name, fields) in expected {
            let desc = family.resource(Some(name)).unwrap();
            assert_eq!(desc.fields.len(), *fields, "{}", name);
        }
    }

    #[test]
    fn students_never_expose_password() {
        let reg = Registry::builtin();
        let students = reg.students.resource(None).unwrap();
        assert!(!students.columns.contains(&"password"));
        assert!(students.field("password").is_some_and(|f| f.kind == FieldKind::Password));
    }
}
