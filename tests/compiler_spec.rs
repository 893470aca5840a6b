use std::fs;
use std::sync::Arc;

use tei_linker::config::{Priority, Settings};
use tei_linker::db::Database;
use tei_linker::index::Indexer;
use tei_linker::xml::{Document, Element, QName};
use tei_linker::{CompileError, Compiler, DocumentCache};
use speculate2::speculate;
use tempfile::TempDir;

const NAMESPACES: &str = r#"xmlns:tei="http://www.tei-c.org/ns/1.0" xmlns:j="http://jewishliturgy.org/ns/jlptei/2""#;

/// A temporary project directory with its own index.
struct Corpus {
    dir: TempDir,
    db: Database,
}

impl Corpus {
    fn new() -> Self {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
            db,
        }
    }

    /// Writes a TEI document whose root holds `body`.
    fn write(&self, project: &str, file_name: &str, body: &str) {
        self.write_with_lang(project, file_name, None, body);
    }

    fn write_with_lang(&self, project: &str, file_name: &str, lang: Option<&str>, body: &str) {
        let directory = self.dir.path().join(project);
        fs::create_dir_all(&directory).expect("Failed to create project directory");
        let lang = lang
            .map(|l| format!(r#" xml:lang="{}""#, l))
            .unwrap_or_default();
        let xml = format!("<tei:TEI {}{}>{}</tei:TEI>", NAMESPACES, lang, body);
        fs::write(directory.join(file_name), xml).expect("Failed to write file");
    }

    /// Writes a complete document as given.
    fn write_raw(&self, project: &str, file_name: &str, xml: &str) {
        let directory = self.dir.path().join(project);
        fs::create_dir_all(&directory).expect("Failed to create project directory");
        fs::write(directory.join(file_name), xml).expect("Failed to write file");
    }

    fn compiler(&self, settings: Settings) -> Compiler {
        Indexer::new(&self.db)
            .sync_projects(self.dir.path())
            .expect("Failed to index corpus");
        let cache = Arc::new(DocumentCache::new(self.dir.path()));
        Compiler::new(cache, self.db.clone(), settings)
    }
}

fn settings(transclusion: &[&str], instructions: &[&str], annotations: &[&str]) -> Settings {
    let owned = |projects: &[&str]| projects.iter().map(|p| p.to_string()).collect();
    Settings {
        priority: Priority {
            transclusion: owned(transclusion),
            instructions: owned(instructions),
        },
        annotations: owned(annotations),
        max_depth: 32,
    }
}

fn wrappers(tree: &Element) -> Vec<&Element> {
    tree.find_all(&QName::processing("transclude"))
}

fn provenance(element: &Element) -> (Option<&str>, Option<&str>) {
    (
        element.attribute(&QName::processing("project")),
        element.attribute(&QName::processing("file_name")),
    )
}

fn texts(elements: &[&Element]) -> Vec<String> {
    elements.iter().map(|e| e.text_content()).collect()
}

/// Text content with whitespace runs collapsed.
fn visible(element: &Element) -> String {
    element.text_content().split_whitespace().collect::<Vec<_>>().join(" ")
}

speculate! {
    before {
        let corpus = Corpus::new();
    }

    describe "whole documents" {
        it "copies a document without directives and stamps the root" {
            corpus.write("A", "plain.xml", r#"<tei:p xml:id="x">Hello <tei:hi>world</tei:hi> again</tei:p>"#);
            let compiler = corpus.compiler(Settings::for_project("A"));

            let tree = compiler.compile("A", "plain.xml").expect("Compile failed");

            assert_eq!(tree.name, QName::tei("TEI"));
            assert_eq!(provenance(&tree), (Some("A"), Some("plain.xml")));
            assert_eq!(tree.text_content(), "Hello world again");
            assert_eq!(tree.find_all(&QName::tei("hi")).len(), 1);
            assert!(wrappers(&tree).is_empty());
        }

        it "reproduces the source apart from provenance" {
            corpus.write("A", "plain.xml", concat!(
                "<tei:div corresp=\"urn:x-opensiddur:test:div\"><tei:p xml:id=\"p1\" rend=\"big\">One</tei:p> ",
                "<tei:p>Two <tei:hi>three</tei:hi></tei:p></tei:div>",
            ));
            let compiler = corpus.compiler(Settings::for_project("A"));

            let mut tree = compiler.compile("A", "plain.xml").expect("Compile failed");
            tree.attributes.retain(|(key, _)| {
                *key != QName::processing("project") && *key != QName::processing("file_name")
            });

            let source = Document::from_file(&corpus.dir.path().join("A/plain.xml")).expect("Parse failed");
            assert_eq!(tree, source.to_element(source.root()));
        }

        it "serializes with the source prefixes" {
            corpus.write("A", "plain.xml", "<tei:p>Hello</tei:p>");
            let compiler = corpus.compiler(Settings::for_project("A"));

            let xml = compiler.compile_to_string("A", "plain.xml").expect("Compile failed");

            assert!(xml.contains(r#"xmlns:tei="http://www.tei-c.org/ns/1.0""#));
            assert!(xml.contains(r#"p:project="A""#));
            assert!(xml.contains("<tei:p>Hello</tei:p>"));
        }

        it "fails for a missing document" {
            let compiler = corpus.compiler(Settings::for_project("A"));
            let result = compiler.compile("A", "missing.xml");
            assert!(matches!(result, Err(CompileError::NotFound(_))));
        }
    }

    describe "external transclusion" {
        before {
            corpus.write("A", "x.xml", concat!(
                "<tei:div><j:transclude target=\"urn:x-opensiddur:test:start\" ",
                "targetEnd=\"urn:x-opensiddur:test:end\" type=\"external\"/></tei:div>",
            ));
            corpus.write("B", "y.xml", concat!(
                "<tei:div>",
                "<tei:p corresp=\"urn:x-opensiddur:test:start\">Start</tei:p> tail1",
                "<tei:p>Middle</tei:p> tail2",
                "<tei:p corresp=\"urn:x-opensiddur:test:end\">End</tei:p> after",
                "</tei:div>",
            ));
        }

        it "splices sibling content without their parent" {
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let found = wrappers(&tree);
            assert_eq!(found.len(), 1);
            let wrapper = found[0];

            assert_eq!(wrapper.attr("target"), Some("urn:x-opensiddur:test:start"));
            assert_eq!(wrapper.attr("targetEnd"), Some("urn:x-opensiddur:test:end"));
            assert_eq!(wrapper.attr("type"), Some("external"));
            assert_eq!(provenance(wrapper), (Some("B"), Some("y.xml")));

            let names: Vec<&QName> = wrapper.children.iter().map(|c| &c.name).collect();
            assert_eq!(names, vec![&QName::tei("p"), &QName::tei("p"), &QName::tei("p")]);
            assert_eq!(wrapper.children[0].tail, " tail1");
            assert_eq!(wrapper.children[1].tail, " tail2");
            assert_eq!(wrapper.text_content(), "Start tail1Middle tail2End");
        }

        it "prefers the project listed first" {
            corpus.write("C", "z.xml", concat!(
                "<tei:p corresp=\"urn:x-opensiddur:test:start\">Other start</tei:p>",
                "<tei:p corresp=\"urn:x-opensiddur:test:end\">Other end</tei:p>",
            ));
            let compiler = corpus.compiler(settings(&["C", "B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let wrapper = wrappers(&tree)[0];
            assert_eq!(provenance(wrapper), (Some("C"), Some("z.xml")));
            assert_eq!(wrapper.text_content(), "Other startOther end");
        }

        it "fails when no prioritized project defines the target" {
            let compiler = corpus.compiler(settings(&["C"], &["A"], &["A"]));
            let result = compiler.compile("A", "x.xml");
            assert!(matches!(result, Err(CompileError::NotFound(_))));
        }

        it "shows the same text as an inline extraction of the same markers" {
            corpus.write("A", "both.xml", concat!(
                "<tei:div><j:transclude target=\"urn:x-opensiddur:test:start\" ",
                "targetEnd=\"urn:x-opensiddur:test:end\" type=\"external\"/>",
                "<j:transclude target=\"urn:x-opensiddur:test:start\" ",
                "targetEnd=\"urn:x-opensiddur:test:end\" type=\"inline\"/></tei:div>",
            ));
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "both.xml").expect("Compile failed");
            let found = wrappers(&tree);
            assert_eq!(found.len(), 2);
            assert_eq!(found[0].attr("type"), Some("external"));
            assert_eq!(found[1].attr("type"), Some("inline"));

            assert_eq!(visible(found[0]), "Start tail1Middle tail2End");
            assert_eq!(visible(found[0]), visible(found[1]));
        }
    }

    describe "ranged urns" {
        it "splices a sibling range from the prioritized project" {
            corpus.write("A", "x.xml", r#"<j:transclude target="urn:x-opensiddur:test:y/1-2" type="external"/>"#);
            corpus.write("B", "y.xml", concat!(
                "<tei:div><tei:seg corresp=\"urn:x-opensiddur:test:y/1\">One</tei:seg>",
                "<tei:seg corresp=\"urn:x-opensiddur:test:y/2\">Two</tei:seg></tei:div>",
            ));
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            assert!(tree.find_all(&QName::jlptei("transclude")).is_empty());
            let wrapper = wrappers(&tree)[0];

            assert_eq!(provenance(wrapper), (Some("B"), Some("y.xml")));
            assert_eq!(wrapper.children.len(), 2);
            assert!(wrapper.children.iter().all(|c| c.name == QName::tei("seg")));
            assert_eq!(texts(&wrapper.children.iter().collect::<Vec<_>>()), vec!["One", "Two"]);
        }
    }

    describe "ranges across a hierarchy" {
        it "keeps only the start's ancestors below the common ancestor" {
            corpus.write("A", "x.xml", r#"<j:transclude target="urn:x-opensiddur:test:start" targetEnd="urn:x-opensiddur:test:end"/>"#);
            corpus.write("B", "y.xml", concat!(
                "<tei:body>",
                "<tei:div corresp=\"urn:x-opensiddur:test:div1\"><tei:head>Before</tei:head>",
                "<tei:p corresp=\"urn:x-opensiddur:test:start\">Start</tei:p><tei:p>Rest</tei:p></tei:div>",
                "<tei:div><tei:p>Mid</tei:p><tei:p corresp=\"urn:x-opensiddur:test:end\">End</tei:p>",
                "<tei:p>After</tei:p></tei:div>",
                "</tei:body>",
            ));
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let wrapper = wrappers(&tree)[0];

            assert_eq!(wrapper.children.len(), 1);
            let body = &wrapper.children[0];
            assert_eq!(body.name, QName::tei("body"));
            assert_eq!(body.children.len(), 2);
            assert_eq!(body.children[0].attr("corresp"), Some("urn:x-opensiddur:test:div1"));
            assert!(body.find_all(&QName::tei("head")).is_empty());
            assert_eq!(
                texts(&body.find_all(&QName::tei("p"))),
                vec!["Start", "Rest", "Mid", "End"]
            );
        }

        it "reproduces each ancestor between the common ancestor and the start once" {
            corpus.write("A", "x.xml", r#"<j:transclude target="urn:x-opensiddur:test:start" targetEnd="urn:x-opensiddur:test:end"/>"#);
            corpus.write("B", "y.xml", concat!(
                "<tei:body>",
                "<tei:div n=\"1\"><tei:ab n=\"a\">Lead <tei:lg n=\"i\">",
                "<tei:l corresp=\"urn:x-opensiddur:test:start\">Start</tei:l><tei:l>Second</tei:l>",
                "</tei:lg></tei:ab></tei:div>",
                "<tei:div n=\"2\"><tei:p corresp=\"urn:x-opensiddur:test:end\">End</tei:p></tei:div>",
                "</tei:body>",
            ));
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let wrapper = wrappers(&tree)[0];
            let body = &wrapper.children[0];

            assert_eq!(body.name, QName::tei("body"));
            assert_eq!(body.find_all(&QName::tei("div")).len(), 2);
            assert_eq!(body.find_all(&QName::tei("ab")).len(), 1);
            assert_eq!(body.find_all(&QName::tei("lg")).len(), 1);

            let div = &body.children[0];
            assert_eq!(div.attr("n"), Some("1"));
            let ab = &div.children[0];
            assert_eq!(ab.name, QName::tei("ab"));
            assert_eq!(ab.attr("n"), Some("a"));
            assert_eq!(ab.text, "");
            assert_eq!(ab.children.len(), 1);
            let lg = &ab.children[0];
            assert_eq!(lg.attr("n"), Some("i"));
            assert_eq!(lg.text, "");
            assert_eq!(texts(&lg.children.iter().collect::<Vec<_>>()), vec!["Start", "Second"]);

            assert_eq!(body.text_content(), "StartSecondEnd");
        }

        it "extracts a verse range that ends at a milestone" {
            corpus.write("A", "x.xml", r#"<j:transclude target="urn:x-opensiddur:test:bible/1/1-2"/>"#);
            corpus.write("B", "y.xml", concat!(
                "<tei:div>",
                "<tei:milestone unit=\"verse\" corresp=\"urn:x-opensiddur:test:bible/1/1\"/>First verse ",
                "<tei:milestone unit=\"verse\" corresp=\"urn:x-opensiddur:test:bible/1/2\"/>Second verse ",
                "<tei:milestone unit=\"verse\" corresp=\"urn:x-opensiddur:test:bible/1/3\"/>Third verse",
                "</tei:div>",
            ));
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let wrapper = wrappers(&tree)[0];

            assert_eq!(wrapper.children.len(), 2);
            assert_eq!(wrapper.text_content(), "First verse Second verse ");
        }

        it "rejects a range whose ends are in different files" {
            corpus.write("A", "x.xml", r#"<j:transclude target="urn:x-opensiddur:test:doc/1-2"/>"#);
            corpus.write("B", "one.xml", r#"<tei:p corresp="urn:x-opensiddur:test:doc/1">One</tei:p>"#);
            corpus.write("B", "two.xml", r#"<tei:p corresp="urn:x-opensiddur:test:doc/2">Two</tei:p>"#);
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let result = compiler.compile("A", "x.xml");
            assert!(matches!(result, Err(CompileError::InvalidRange(_))));
        }

        it "does not find a split range outside the prioritized projects" {
            corpus.write("A", "x.xml", r#"<j:transclude target="urn:x-opensiddur:test:doc/1-2"/>"#);
            corpus.write("B", "one.xml", r#"<tei:p corresp="urn:x-opensiddur:test:doc/1">One</tei:p>"#);
            corpus.write("B", "two.xml", r#"<tei:p corresp="urn:x-opensiddur:test:doc/2">Two</tei:p>"#);
            let compiler = corpus.compiler(settings(&["C"], &["A"], &["A"]));

            let result = compiler.compile("A", "x.xml");
            assert!(matches!(result, Err(CompileError::NotFound(_))));
        }

        it "rejects a ranged target that also has a targetEnd" {
            corpus.write("A", "x.xml", r#"<j:transclude target="urn:x-opensiddur:test:doc/1-2" targetEnd="urn:x-opensiddur:test:doc/2"/>"#);
            corpus.write("B", "y.xml", concat!(
                "<tei:p corresp=\"urn:x-opensiddur:test:doc/1\">One</tei:p>",
                "<tei:p corresp=\"urn:x-opensiddur:test:doc/2\">Two</tei:p>",
            ));
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let result = compiler.compile("A", "x.xml");
            assert!(matches!(result, Err(CompileError::InvalidRange(_))));
        }
    }

    describe "local targets" {
        it "transcludes from the same document without provenance" {
            corpus.write("A", "x.xml", r##"<tei:p xml:id="greeting">Hello</tei:p><j:transclude target="#greeting"/>"##);
            let compiler = corpus.compiler(Settings::for_project("A"));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let wrapper = wrappers(&tree)[0];

            assert_eq!(provenance(wrapper), (None, None));
            assert_eq!(wrapper.children.len(), 1);
            assert_eq!(wrapper.children[0].text_content(), "Hello");
        }
    }

    describe "inline transclusion" {
        it "flattens the range into text" {
            corpus.write("A", "x.xml", r#"<tei:p><j:transclude target="urn:x-opensiddur:test:start" targetEnd="urn:x-opensiddur:test:end" type="inline"/></tei:p>"#);
            corpus.write("B", "y.xml", concat!(
                "<tei:p corresp=\"urn:x-opensiddur:test:start\">Start <tei:hi>bold</tei:hi>text</tei:p>",
                "<tei:p>Middle</tei:p>",
                "<tei:p corresp=\"urn:x-opensiddur:test:end\">End</tei:p> excluded",
            ));
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let wrapper = wrappers(&tree)[0];

            assert_eq!(wrapper.attr("type"), Some("inline"));
            assert!(wrapper.children.is_empty());
            assert_eq!(wrapper.text, "Start bold textMiddleEnd");
        }

        it "makes nested transclusions inline" {
            corpus.write("A", "x.xml", r#"<j:transclude target="urn:x-opensiddur:test:outer" type="inline"/>"#);
            corpus.write("B", "y.xml", r#"<tei:p corresp="urn:x-opensiddur:test:outer">Outer <j:transclude target="urn:x-opensiddur:test:inner"/></tei:p>"#);
            corpus.write("B", "z.xml", r#"<tei:p corresp="urn:x-opensiddur:test:inner">Inner text</tei:p>"#);
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let found = wrappers(&tree);
            assert_eq!(found.len(), 2);

            let nested = found[1];
            assert_eq!(nested.attr("type"), Some("inline"));
            assert_eq!(provenance(nested), (Some("B"), Some("z.xml")));
            assert_eq!(nested.text, "Inner text");
        }

        it "keeps a change of language as a nested container" {
            corpus.write_with_lang("A", "x.xml", Some("he"), r#"<j:transclude target="urn:x-opensiddur:test:verse" type="inline"/>"#);
            corpus.write_with_lang("B", "y.xml", Some("he"), r#"<tei:p corresp="urn:x-opensiddur:test:verse">Hebrew <tei:foreign xml:lang="en">English</tei:foreign></tei:p>"#);
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let wrapper = wrappers(&tree)[0];

            assert_eq!(wrapper.attribute(&QName::xml("lang")), None);
            let nested = wrapper.find_all(&QName::processing("transcludeInline"));
            assert_eq!(nested.len(), 1);
            assert_eq!(nested[0].attribute(&QName::xml("lang")), Some("en"));
            assert_eq!(nested[0].text, "English");
            assert_eq!(wrapper.text, "Hebrew ");
        }

        it "keeps an instruction inside the range as an element" {
            corpus.write("A", "x.xml", r#"<tei:p><j:transclude target="urn:x-opensiddur:test:s" targetEnd="urn:x-opensiddur:test:e" type="inline"/></tei:p>"#);
            corpus.write("B", "y.xml", concat!(
                "<tei:p corresp=\"urn:x-opensiddur:test:s\">S</tei:p>",
                "<tei:note type=\"instruction\">Bow</tei:note>",
                "<tei:p corresp=\"urn:x-opensiddur:test:e\">E</tei:p>",
            ));
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let wrapper = wrappers(&tree)[0];

            assert_eq!(wrapper.text, "S");
            assert_eq!(wrapper.children.len(), 1);
            let note = &wrapper.children[0];
            assert_eq!(note.name, QName::tei("note"));
            assert_eq!(note.attr("type"), Some("instruction"));
            assert_eq!(note.text, "Bow");
            assert_eq!(note.tail, "E");
        }

        it "inserts commentary on an instruction inside the range" {
            corpus.write("A", "x.xml", r#"<tei:p><j:transclude target="urn:x-opensiddur:test:s" targetEnd="urn:x-opensiddur:test:e" type="inline"/></tei:p>"#);
            corpus.write("B", "y.xml", concat!(
                "<tei:p corresp=\"urn:x-opensiddur:test:s\">S</tei:p>",
                "<tei:note type=\"instruction\" xml:id=\"ins\">Do it</tei:note>",
                "<tei:p corresp=\"urn:x-opensiddur:test:e\">E</tei:p>",
                "<tei:note type=\"comment\" target=\"#ins\">Comment on instruction</tei:note>",
            ));
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["B"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let wrapper = wrappers(&tree)[0];

            let instruction = &wrapper.children[0];
            assert_eq!(instruction.attribute(&QName::xml("id")), Some("ins"));
            assert_eq!(instruction.text, "");
            assert_eq!(instruction.children.len(), 1);
            assert_eq!(instruction.children[0].text, "Comment on instruction");
            assert_eq!(instruction.children[0].tail, "Do it");
        }
    }

    describe "languages" {
        it "marks transcluded content in another language" {
            corpus.write_with_lang("A", "x.xml", Some("en"), r#"<j:transclude target="urn:x-opensiddur:test:verse"/>"#);
            corpus.write_with_lang("B", "y.xml", Some("he"), r#"<tei:p corresp="urn:x-opensiddur:test:verse">Text</tei:p>"#);
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            assert_eq!(tree.attribute(&QName::xml("lang")), Some("en"));
            assert_eq!(wrappers(&tree)[0].attribute(&QName::xml("lang")), Some("he"));
        }

        it "leaves content in the same language unmarked" {
            corpus.write_with_lang("A", "x.xml", Some("en"), r#"<j:transclude target="urn:x-opensiddur:test:verse"/>"#);
            corpus.write_with_lang("B", "y.xml", Some("en"), r#"<tei:p corresp="urn:x-opensiddur:test:verse">Text</tei:p>"#);
            let compiler = corpus.compiler(settings(&["B"], &["A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            assert_eq!(wrappers(&tree)[0].attribute(&QName::xml("lang")), None);
        }
    }

    describe "annotations" {
        before {
            corpus.write("A", "x.xml", r#"<tei:p corresp="urn:x-opensiddur:test:para">Targeted</tei:p>"#);
            corpus.write("C", "notes.xml", r#"<tei:note type="comment" target="urn:x-opensiddur:test:para">A comment</tei:note>"#);
        }

        it "inserts notes from annotation projects ahead of the text" {
            let compiler = corpus.compiler(settings(&["A"], &["A"], &["C"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let paragraph = &tree.children[0];

            assert_eq!(paragraph.text, "");
            assert_eq!(paragraph.children.len(), 1);
            let note = &paragraph.children[0];
            assert_eq!(note.name, QName::tei("note"));
            assert_eq!(note.text, "A comment");
            assert_eq!(note.tail, "Targeted");
            assert_eq!(provenance(note), (Some("C"), Some("notes.xml")));
        }

        it "orders notes by the annotation list" {
            corpus.write("D", "notes.xml", r#"<tei:note type="comment" target="urn:x-opensiddur:test:para">D comment</tei:note>"#);
            let compiler = corpus.compiler(settings(&["A"], &["A"], &["D", "C"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let paragraph = &tree.children[0];

            assert_eq!(paragraph.text, "");
            assert_eq!(texts(&paragraph.children.iter().collect::<Vec<_>>()), vec!["D comment", "A comment"]);
            assert_eq!(provenance(&paragraph.children[0]), (Some("D"), Some("notes.xml")));
            assert_eq!(paragraph.children[0].tail, "");
            assert_eq!(paragraph.children[1].tail, "Targeted");
            assert_eq!(paragraph.text_content(), "D commentA commentTargeted");
        }

        it "inserts notes that target an xml:id in the same file" {
            corpus.write("A", "local.xml", r##"<tei:p xml:id="para1">Targeted</tei:p><tei:note type="comment" target="#para1">Local comment</tei:note>"##);
            let compiler = corpus.compiler(settings(&["A"], &["A"], &["A"]));

            let tree = compiler.compile("A", "local.xml").expect("Compile failed");
            let paragraph = &tree.children[0];

            assert_eq!(paragraph.children.len(), 1);
            let note = &paragraph.children[0];
            assert_eq!(note.text, "Local comment");
            assert_eq!(note.tail, "Targeted");
            assert_eq!(provenance(note), (None, None));
        }

        it "annotates the root of the compiled document" {
            corpus.write_raw("A", "rooted.xml", &format!(
                r#"<tei:TEI {} corresp="urn:x-opensiddur:test:root"><tei:p>body</tei:p></tei:TEI>"#,
                NAMESPACES,
            ));
            corpus.write("C", "root-notes.xml", r#"<tei:note type="comment" target="urn:x-opensiddur:test:root">On the root</tei:note>"#);
            let compiler = corpus.compiler(settings(&["A"], &["A"], &["C"]));

            let tree = compiler.compile("A", "rooted.xml").expect("Compile failed");

            assert_eq!(tree.children.len(), 2);
            assert_eq!(tree.children[0].name, QName::tei("note"));
            assert_eq!(tree.children[0].text, "On the root");
            assert_eq!(provenance(&tree.children[0]), (Some("C"), Some("root-notes.xml")));
            assert_eq!(tree.children[1].name, QName::tei("p"));
        }

        it "ignores notes from unlisted projects" {
            let compiler = corpus.compiler(Settings::for_project("A"));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            assert!(tree.find_all(&QName::tei("note")).is_empty());
        }
    }

    describe "instructions" {
        before {
            corpus.write("A", "x.xml", r#"<tei:note type="instruction" corresp="urn:x-opensiddur:test:instr">Default</tei:note> after"#);
            corpus.write("R", "rubric.xml", r#"<tei:note type="instruction" corresp="urn:x-opensiddur:test:instr">Preferred</tei:note>"#);
        }

        it "replaces an instruction with the preferred project's" {
            let compiler = corpus.compiler(settings(&["A"], &["R", "A"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let note = &tree.children[0];

            assert_eq!(note.text, "Preferred");
            assert_eq!(note.tail, " after");
            assert_eq!(provenance(note), (Some("R"), Some("rubric.xml")));
        }

        it "keeps an instruction that is already preferred" {
            let compiler = corpus.compiler(settings(&["A"], &["A", "R"], &["A"]));

            let tree = compiler.compile("A", "x.xml").expect("Compile failed");
            let note = &tree.children[0];

            assert_eq!(note.text, "Default");
            assert_eq!(provenance(note), (None, None));
        }
    }

    describe "failures" {
        it "stops a transclusion that includes itself" {
            corpus.write("A", "x.xml", r#"<tei:p corresp="urn:x-opensiddur:test:loop"><j:transclude target="urn:x-opensiddur:test:loop"/></tei:p>"#);
            let compiler = corpus.compiler(Settings::for_project("A"));

            let result = compiler.compile("A", "x.xml");
            assert!(matches!(result, Err(CompileError::CyclicTransclusion { limit: 32, .. })));
        }

        it "reports a target nobody defines" {
            corpus.write("A", "x.xml", r#"<j:transclude target="urn:x-opensiddur:test:nowhere"/>"#);
            let compiler = corpus.compiler(Settings::for_project("A"));

            let result = compiler.compile("A", "x.xml");
            assert!(matches!(result, Err(CompileError::NotFound(_))));
        }
    }
}
