use pretty_assertions::assert_eq;
use proptest::prelude::*;
use xml2builder::{BuilderError, ScopedBuilder};

#[derive(Debug, Clone)]
enum Op {
    Create(u8),
    Within,
    EndWithin,
    Attribute(u8),
    Text(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..4).prop_map(Op::Create),
        2 => Just(Op::Within),
        2 => Just(Op::EndWithin),
        1 => (0u8..100).prop_map(Op::Attribute),
        1 => any::<bool>().prop_map(Op::Text),
    ]
}

/// Reference model of the scope stack: depth plus the pending-widen flag.
#[derive(Default)]
struct Model {
    depth: usize,
    pending: bool,
}

impl Model {
    fn create(&mut self) {
        if self.depth == 0 {
            self.depth = 1;
        } else if self.pending {
            self.depth += 1;
            self.pending = false;
        }
    }

    fn end_within(&mut self) -> Result<(), BuilderError> {
        if self.pending {
            self.pending = false;
            Ok(())
        } else if self.depth <= 1 {
            Err(BuilderError::ScopeUnderflow)
        } else {
            self.depth -= 1;
            Ok(())
        }
    }
}

proptest! {
    #[test]
    fn depth_tracks_pushes_minus_pops(ops in prop::collection::vec(op(), 0..64)) {
        let mut builder = ScopedBuilder::new();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Create(n) => {
                    builder.create_node(&format!("n{n}")).unwrap();
                    model.create();
                }
                Op::Within => {
                    builder.within();
                    model.pending = true;
                }
                Op::EndWithin => {
                    let expected = model.end_within();
                    let actual = builder.end_within().map(|_| ());
                    prop_assert_eq!(actual, expected);
                }
                Op::Attribute(v) => {
                    let result = builder.set_attribute("v", v).map(|_| ());
                    prop_assert_eq!(result.is_ok(), model.depth > 0);
                }
                Op::Text(cdata) => {
                    let result = builder.set_text_with("t", cdata).map(|_| ());
                    prop_assert_eq!(result.is_ok(), model.depth > 0);
                }
            }
            prop_assert_eq!(builder.depth(), model.depth);
        }

        let rendered = builder.render();
        prop_assert_eq!(&rendered, &builder.render());
        let declarations = rendered.matches("<?xml").count();
        prop_assert_eq!(declarations, usize::from(model.depth > 0));
        prop_assert!(builder.document().children().len() <= 1);
    }
}

#[test]
fn nested_catalog_renders_expected_markup() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut b = ScopedBuilder::new();
    b.declaration("1.0", "UTF-8", xml2builder::Standalone::Yes)
        .unwrap()
        .create_node("catalog")
        .unwrap()
        .set_attribute("version", 2)
        .unwrap();

    for (id, title) in [(1, "Dune"), (2, "Solaris")] {
        b.create_node("book").unwrap().set_attribute("id", id).unwrap();
        b.scoped(|b| {
            b.create_node("title")?.set_text_with(title, false)?;
            b.create_node("note")?.set_text("<draft>")?;
            Ok(())
        })
        .unwrap();
    }

    assert_eq!(
        b.render(),
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<catalog version=\"2\">\
<book id=\"1\"><title>Dune</title><note><![CDATA[<draft>]]></note></book>\
<book id=\"2\"><title>Solaris</title><note><![CDATA[<draft>]]></note></book>\
</catalog>\n"
    );
    assert_eq!(b.depth(), 1);
}

#[test]
fn into_document_keeps_the_tree() {
    let mut b = ScopedBuilder::new();
    b.create_node("root").unwrap().within().create_node("leaf").unwrap();
    let doc = b.into_document();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.node(root).unwrap().children.len(), 1);
    assert_eq!(
        xml2builder::save::dump_document(&doc, 0),
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<root><leaf/></root>\n"
    );
}
