// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use redline_engine::tree::{ContainerKind, Document, Node};

#[allow(dead_code)]
pub const CLAUSE: &str = "The Defendant’s motion under Rule 12(b)(6) fails because the complaint pleads facts that, taken as true, state a plausible claim for relief. ";

/// `sections` headings, each followed by `paragraphs` paragraphs of legal boilerplate.
#[allow(dead_code)]
pub fn generate_brief(sections: usize, paragraphs: usize) -> Document {
    let mut content = Vec::with_capacity(sections * (paragraphs + 1));
    for section in 0..sections {
        content.push(Node::heading(2, &format!("Section {section}")));
        for paragraph in 0..paragraphs {
            let text = format!("{}See Exhibit {section}-{paragraph}.", CLAUSE.repeat(3));
            content.push(Node::paragraph(&text));
        }
        content.push(Node::container(
            ContainerKind::BulletList,
            vec![Node::container(ContainerKind::ListItem, vec![Node::paragraph("Item")])],
        ));
    }
    Document::new(content)
}
