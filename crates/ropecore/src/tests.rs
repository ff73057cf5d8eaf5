#[cfg(test)]
mod unit_tests {
    use super::super::*;

    fn text(document: &Document) -> String {
        String::from_utf8(document.full_text()).unwrap()
    }

    /// Records the pre-edit state the way an editing session does.
    fn edit(
        document: &mut Document,
        history: &mut History,
        apply: impl FnOnce(&mut Document) -> Result<()>,
    ) {
        let before = document.snapshot().unwrap();
        apply(document).unwrap();
        history.record(before);
    }

    fn undo(document: &mut Document, history: &mut History) -> bool {
        let current = document.snapshot().unwrap();
        match history.undo(current) {
            Some(previous) => {
                document.restore(&previous).unwrap();
                true
            }
            None => false,
        }
    }

    fn redo(document: &mut Document, history: &mut History) -> bool {
        let current = document.snapshot().unwrap();
        match history.redo(current) {
            Some(next) => {
                document.restore(&next).unwrap();
                true
            }
            None => false,
        }
    }

    #[test]
    fn test_undo_redo_symmetry() {
        let mut document = Document::from_bytes(b"hello").unwrap();
        let mut history = History::default();

        edit(&mut document, &mut history, |d| d.insert(5, b" world"));
        edit(&mut document, &mut history, |d| d.split_line_at(5));
        assert_eq!(text(&document), "hello\n world");

        assert!(undo(&mut document, &mut history));
        assert_eq!(text(&document), "hello world");
        assert_eq!(document.line_count(), 1);

        assert!(undo(&mut document, &mut history));
        assert_eq!(text(&document), "hello");
        assert!(!undo(&mut document, &mut history));

        assert!(redo(&mut document, &mut history));
        assert!(redo(&mut document, &mut history));
        assert_eq!(text(&document), "hello\n world");
        assert_eq!(document.line_count(), 2);
        assert!(!redo(&mut document, &mut history));
    }

    #[test]
    fn test_new_edit_after_undo_drops_redo() {
        let mut document = Document::new();
        let mut history = History::default();
        edit(&mut document, &mut history, |d| d.insert(0, b"abc"));
        assert!(undo(&mut document, &mut history));
        edit(&mut document, &mut history, |d| d.insert(0, b"xyz"));
        assert!(!redo(&mut document, &mut history));
        assert_eq!(text(&document), "xyz");
    }

    #[test]
    fn test_bounded_history_forgets_oldest() {
        let mut document = Document::new();
        let mut history = History::new(3, OverflowPolicy::DiscardOldest);
        for i in 0..5 {
            edit(&mut document, &mut history, |d| {
                d.insert(d.len(), i.to_string().as_bytes())
            });
        }
        assert_eq!(text(&document), "01234");
        while undo(&mut document, &mut history) {}
        assert_eq!(text(&document), "01");
    }

    #[test]
    fn test_legacy_snapshot_restores_same_shape() {
        let mut document = Document::with_strategy(RebalanceStrategy::LegacyChain);
        for _ in 0..8 {
            document.insert(document.len(), b"0123456789abcdef\n").unwrap();
        }
        let memento = document.snapshot().unwrap();
        let (tree, lines) = memento.restore().unwrap();
        assert_eq!(tree.height(), document.rope().height());
        assert_eq!(tree.node_count(), document.rope().node_count());
        assert_eq!(&lines, document.lines());
        assert_eq!(lines.line_count(), 9);
    }

    #[test]
    fn test_corrupted_snapshot_is_reported() {
        let document = Document::from_bytes(b"some text").unwrap();
        let memento = document.snapshot().unwrap();
        let mut bytes = memento.tree_bytes().to_vec();
        bytes.truncate(bytes.len() - 3);
        let err = memento::deserialize(&bytes).unwrap_err();
        assert!(matches!(err, RopeError::MalformedSnapshot { .. }));
        assert!(err.to_string().starts_with("malformed snapshot at byte"));
    }

    #[test]
    fn test_multibyte_text_survives_chunking() {
        let text = "日本語のテキストと絵文字😀を含む行\n二行目";
        let document = Document::from_bytes(text.as_bytes()).unwrap();
        assert!(document.rope().leaves().count() > 1);
        assert_eq!(document.rope().to_string(), text);
        assert_eq!(document.line_text(1).unwrap(), "二行目".as_bytes());
    }
}
