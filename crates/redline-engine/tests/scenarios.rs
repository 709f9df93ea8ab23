//! End-to-end batches against stored documents, from operations on the wire
//! to reviewed results.

use pretty_assertions::assert_eq;
use redline_engine::changes::{accept_all, reject_all, toggle_group_visibility};
use redline_engine::invariants::{check_projection, check_tree};
use redline_engine::outline::render;
use redline_engine::{
    BatchRequest, ChangeSource, ChangeType, Document, DocumentStore, EditOperation, Engine, FindSpec, InsertTarget,
    MemoryStore, ProjectionOptions, SemanticType, project,
};

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))).unwrap()
}

fn brief() -> Document {
    Document::from_json(&fixture("brief.json")).unwrap()
}

fn brief_ops() -> Vec<EditOperation> {
    EditOperation::list_from_json(&fixture("brief_ops.json")).unwrap()
}

fn greetings() -> Document {
    Document::from_paragraphs(&["Hello world", "Hello again"])
}

fn request(operations: Vec<EditOperation>) -> BatchRequest {
    BatchRequest {
        document_id: "brief".to_string(),
        operations,
        label: Some("Round one".to_string()),
        source: ChangeSource::Tool,
    }
}

fn run(doc: Document, operations: Vec<EditOperation>) -> (redline_engine::BatchReport, Document) {
    let store = MemoryStore::new();
    store.insert("brief", doc);
    let report = Engine::default().run(&store, &request(operations)).unwrap();
    let stored = store.snapshot("brief").unwrap().document;
    (report, stored)
}

#[test]
fn replace_with_context_picks_the_right_hello() {
    let op = EditOperation::Replace {
        find: FindSpec::new("Hello").context_after("world"),
        replace_text: "Hi".to_string(),
    };
    let (report, doc) = run(greetings(), vec![op]);

    assert!(report.success);
    assert_eq!(report.version, 2);
    // short blocks are replaced as a whole
    insta::assert_snapshot!(render(&doc), @r"
    paragraph: {-Hello world-}{+Hi world+}
    paragraph: Hello again
    ");

    let group = doc.group(report.change_id.as_deref().unwrap()).unwrap();
    assert_eq!(group.label, "Round one");
    let kinds: Vec<_> = group.patches.iter().map(|p| (p.change_type, p.semantic_type)).collect();
    assert_eq!(
        kinds,
        vec![
            (ChangeType::Deleted, SemanticType::Replacement),
            (ChangeType::Added, SemanticType::Replacement),
        ]
    );
}

#[test]
fn insert_after_anchor_without_context_hits_the_first_occurrence() {
    let op = EditOperation::Insert {
        insert_text: " there".to_string(),
        target: InsertTarget::after("Hello"),
    };
    let (report, doc) = run(greetings(), vec![op]);

    assert_eq!(report.message, "1 of 1 operations applied");
    assert_eq!(doc.block_texts(), vec!["Hello there world", "Hello again"]);
    insta::assert_snapshot!(render(&doc), @r"
    paragraph: {-Hello world-}{+Hello there world+}
    paragraph: Hello again
    ");
}

#[test]
fn brief_batch_is_annotated_as_one_group() {
    let (report, doc) = run(brief(), brief_ops());

    assert!(report.success);
    assert_eq!((report.applied, report.total), (6, 7));
    assert_eq!(report.message, "6 of 7 operations applied");
    assert_eq!(report.results[5].kind, "delete");
    assert_eq!(report.results[5].error.as_deref(), Some("text not found: \"Goodbye\""));
    assert_eq!(doc.change_groups.len(), 1);
    assert_eq!(check_tree(&doc.content), Ok(()));

    insta::assert_snapshot!(render(&doc), @r"
    heading(1): [b]Memorandum in Opposition[/b]
    paragraph: Plaintiff Acme Corp. respectfully submits this memorandum in opposition to the Defendant’s motion to dismiss{+ under Rule 12(b)(6)+}.
    heading(2): Statement of Facts
    paragraph: On March 3, 2021, the parties executed the Supply Agreement. {-Section 2-}{+[b]Section 2[/b]+} of the Supply Agreement requires delivery within {-thirty-}{+90+} days.
    blockquote
      paragraph: Time is of the essence.
    heading(2): Argument
    bullet_list
      list_item
        paragraph: The complaint states a claim.
      list_item
        paragraph: {-The claim is timely.-}
    added(insertion)
      heading(2): Conclusion
    added(insertion)
      paragraph: For these reasons, the motion should be denied.
    ");
}

#[test]
fn brief_patches_carry_semantic_types() {
    let (report, doc) = run(brief(), brief_ops());
    let group = doc.group(report.change_id.as_deref().unwrap()).unwrap();
    let semantics: Vec<_> = group.patches.iter().map(|p| p.semantic_type).collect();
    assert_eq!(
        semantics,
        vec![
            SemanticType::Insertion,
            SemanticType::Formatting,
            SemanticType::Formatting,
            SemanticType::Replacement,
            SemanticType::Replacement,
            SemanticType::Deletion,
            SemanticType::Insertion,
            SemanticType::Insertion,
        ]
    );
    assert!(group.patches.windows(2).all(|w| w[0].from <= w[1].from));
}

#[test]
fn projections_of_annotated_briefs_hide_deletions() {
    let (_, doc) = run(brief(), brief_ops());
    let projection = project(&doc.content, &ProjectionOptions::default());
    assert_eq!(check_projection(&doc.content, &projection), Ok(()));
    assert!(projection.text.contains("within 90 days"));
    assert!(!projection.text.contains("thirty"));
    assert!(!projection.text.contains("The claim is timely."));

    let raw = project(&doc.content, &ProjectionOptions::raw());
    assert!(!raw.text.contains("thirty"));
    assert!(raw.text.contains("12(b)(6).Statement of Facts"));
}

#[test]
fn deleted_text_cannot_be_targeted_again() {
    let (_, doc) = run(brief(), brief_ops());
    let op = EditOperation::Replace {
        find: FindSpec::new("thirty"),
        replace_text: "sixty".to_string(),
    };
    let (report, after) = run(doc.clone(), vec![op]);
    assert!(!report.success);
    assert_eq!(report.change_id, None);
    assert_eq!(after, doc);
}

#[test]
fn accepting_a_brief_batch() {
    let (_, doc) = run(brief(), brief_ops());
    let accepted = accept_all(&doc);
    assert!(accepted.change_groups.is_empty());
    assert_eq!(check_tree(&accepted.content), Ok(()));
    insta::assert_snapshot!(render(&accepted), @r"
    heading(1): [b]Memorandum in Opposition[/b]
    paragraph: Plaintiff Acme Corp. respectfully submits this memorandum in opposition to the Defendant’s motion to dismiss under Rule 12(b)(6).
    heading(2): Statement of Facts
    paragraph: On March 3, 2021, the parties executed the Supply Agreement. [b]Section 2[/b] of the Supply Agreement requires delivery within 90 days.
    blockquote
      paragraph: Time is of the essence.
    heading(2): Argument
    bullet_list
      list_item
        paragraph: The complaint states a claim.
      list_item
        paragraph:
    heading(2): Conclusion
    paragraph: For these reasons, the motion should be denied.
    ");
}

#[test]
fn rejecting_a_brief_batch_restores_the_original() {
    let (_, doc) = run(brief(), brief_ops());
    let rejected = reject_all(&doc);
    assert_eq!(rejected, brief());
}

#[test]
fn a_second_batch_adds_a_second_group() {
    let (first, doc) = run(brief(), brief_ops());
    let op = EditOperation::AddMark {
        find: FindSpec::new("Time is of the essence."),
        mark_type: "italic".to_string(),
    };
    let (second, doc) = run(doc, vec![op]);

    assert_eq!(doc.change_groups.len(), 2);
    assert_ne!(first.change_id, second.change_id);
    let hidden = toggle_group_visibility(&doc, second.change_id.as_deref().unwrap()).unwrap();
    assert!(!hidden.group(second.change_id.as_deref().unwrap()).unwrap().visible);

    let outline = render(&reject_all(&doc));
    assert_eq!(outline, render(&brief()));
}
