use anyhow::Result;
use std::path::PathBuf;

use crate::editor::Editor;
use crate::file_manager::FileManager;

/// Line and column arguments and readbacks are 1-based; offsets are 0-based
/// byte offsets.
pub struct CommandProcessor;

impl CommandProcessor {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute_command(
        &self,
        command: &str,
        editor: &mut Editor,
        file_manager: &mut FileManager,
        should_quit: &mut bool,
    ) -> Result<String> {
        let cmd = command.trim_start().trim_end_matches(['\r', '\n']);
        if cmd.trim().is_empty() {
            return Ok(String::new());
        }

        let (name, rest) = match cmd.split_once(' ') {
            Some((name, rest)) => (name, rest),
            None => (cmd.trim_end(), ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        match name {
            "insert" | "i" => {
                let (offset, text) = rest
                    .split_once(' ')
                    .ok_or_else(|| anyhow::anyhow!("E471: Argument required"))?;
                let offset = parse_number(Some(offset), "offset")?;
                let text = unescape(text);
                editor.insert(offset, text.as_bytes())?;
                Ok(format!("Inserted {} bytes at {}", text.len(), offset))
            }
            "delete" | "d" => {
                let offset = parse_number(args.first().copied(), "offset")?;
                let len = parse_number(args.get(1).copied(), "length")?;
                editor.delete(offset, len)?;
                Ok(format!("Deleted {} bytes at {}", len, offset))
            }
            "split" => {
                let offset = parse_number(args.first().copied(), "offset")?;
                editor.split_line_at(offset)?;
                Ok(format!("Split line at {}", offset))
            }
            "type" => {
                if rest.is_empty() {
                    return Err(anyhow::anyhow!("E471: Argument required"));
                }
                editor.insert_str(&unescape(rest))?;
                Ok(String::new())
            }
            "newline" => {
                editor.insert_newline()?;
                Ok(String::new())
            }
            "tab" => {
                editor.insert_tab()?;
                Ok(String::new())
            }
            "backspace" => {
                editor.delete_backward()?;
                Ok(String::new())
            }
            "del" => {
                editor.delete_forward()?;
                Ok(String::new())
            }
            "left" => {
                editor.move_cursor_left();
                Ok(String::new())
            }
            "right" => {
                editor.move_cursor_right();
                Ok(String::new())
            }
            "up" => {
                editor.move_cursor_up();
                Ok(String::new())
            }
            "down" => {
                editor.move_cursor_down();
                Ok(String::new())
            }
            "goto" => {
                let line = parse_position(args.first().copied(), "line")?;
                let column = parse_position(args.get(1).copied().or(Some("1")), "column")?;
                editor.set_cursor(line, column);
                Ok(position_message(editor))
            }
            "undo" | "u" => {
                if editor.undo()? {
                    Ok("1 change undone".to_string())
                } else {
                    Ok("Already at oldest change".to_string())
                }
            }
            "redo" => {
                if editor.redo()? {
                    Ok("1 change redone".to_string())
                } else {
                    Ok("Already at newest change".to_string())
                }
            }
            "w" => {
                if let Some(path) = args.first() {
                    file_manager.save_file_as(PathBuf::from(path), editor).await
                } else if file_manager.has_file() {
                    file_manager.save_file(editor).await
                } else {
                    Err(anyhow::anyhow!("E32: No file name"))
                }
            }
            "wq" | "x" => {
                let result = if let Some(path) = args.first() {
                    file_manager.save_file_as(PathBuf::from(path), editor).await?
                } else if file_manager.has_file() {
                    file_manager.save_file(editor).await?
                } else {
                    return Err(anyhow::anyhow!("E32: No file name"));
                };
                *should_quit = true;
                Ok(format!("{} - Quitting", result))
            }
            "q" => {
                if editor.is_modified() {
                    Err(anyhow::anyhow!(
                        "E37: No write since last change (add ! to override)"
                    ))
                } else {
                    *should_quit = true;
                    Ok("Quitting".to_string())
                }
            }
            "q!" => {
                *should_quit = true;
                Ok("Force quitting".to_string())
            }
            "e" | "e!" => {
                let path = args
                    .first()
                    .ok_or_else(|| anyhow::anyhow!("E471: Argument required"))?;
                if name == "e" && editor.is_modified() {
                    return Err(anyhow::anyhow!(
                        "E37: No write since last change (add ! to override)"
                    ));
                }
                let content = file_manager.open_file(PathBuf::from(path)).await?;
                editor.load_bytes(&content)?;
                Ok(format!(
                    "\"{}\" {} lines, {} bytes",
                    path,
                    editor.line_count(),
                    content.len()
                ))
            }
            "print" | "p" => Ok(editor.get_content()),
            "lines" => {
                let document = editor.document();
                let mut output = String::new();
                for line in 0..document.line_count() {
                    let text = document.line_text(line)?;
                    output.push_str(&format!(
                        "{:>4} {}\n",
                        line + 1,
                        String::from_utf8_lossy(&text)
                    ));
                }
                Ok(output.trim_end_matches('\n').to_string())
            }
            "line" => {
                let line = parse_position(args.first().copied(), "line")?;
                let text = editor.document().line_text(line)?;
                Ok(String::from_utf8_lossy(&text).into_owned())
            }
            "pos" => Ok(position_message(editor)),
            "offset" => {
                let line = parse_position(args.first().copied(), "line")?;
                let column = parse_position(args.get(1).copied().or(Some("1")), "column")?;
                let offset = editor.document().offset_at(line, column)?;
                Ok(offset.to_string())
            }
            "stats" => {
                let document = editor.document();
                let rope = document.rope();
                let history = editor.history();
                Ok(format!(
                    "{} bytes, {} lines, height {}, {} nodes, {}balanced, undo {} / redo {} ({} bytes)",
                    rope.len(),
                    document.line_count(),
                    rope.height(),
                    rope.node_count(),
                    if rope.is_balanced() { "" } else { "not " },
                    history.undo_len(),
                    history.redo_len(),
                    history.size_in_bytes()
                ))
            }
            _ => Err(anyhow::anyhow!("E492: Not an editor command: {}", cmd.trim())),
        }
    }
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number(arg: Option<&str>, what: &str) -> Result<usize> {
    let arg = arg.ok_or_else(|| anyhow::anyhow!("E471: Argument required: {}", what))?;
    arg.trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("E474: Invalid {}: {}", what, arg))
}

/// Converts a 1-based argument to a 0-based index.
fn parse_position(arg: Option<&str>, what: &str) -> Result<usize> {
    let value = parse_number(arg, what)?;
    value
        .checked_sub(1)
        .ok_or_else(|| anyhow::anyhow!("E474: Invalid {}: {} (counting starts at 1)", what, value))
}

fn position_message(editor: &Editor) -> String {
    let (line, column) = editor.cursor_position();
    format!(
        "line {}, column {}, offset {}",
        line + 1,
        column + 1,
        editor.cursor_offset()
    )
}

/// Expands `\n`, `\t` and `\\`. Other backslash sequences are kept as typed.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
