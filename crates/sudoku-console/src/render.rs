use std::io::{self, Write};

use crossterm::{
    execute,
    style::{Print, ResetColor, SetForegroundColor},
};
use sudoku_core::{Grid, Position, EMPTY, REGION_SIDE, SIDE};

use crate::swarm::Summary;
use crate::theme::Theme;

const THICK: &str = "+===+===+===+===+===+===+===+===+===+";
const THIN: &str = "+---+---+---+---+---+---+---+---+---+";

pub fn render<W: Write>(out: &mut W, summary: &Summary, theme: &Theme) -> io::Result<()> {
    execute!(
        out,
        SetForegroundColor(theme.info),
        Print("Challenge "),
        SetForegroundColor(theme.key),
        Print(&summary.name),
        SetForegroundColor(theme.info),
        Print(format!(" ({})\n\n", summary.status)),
    )?;
    render_grid(out, &summary.puzzle, theme)?;
    execute!(out, Print("\n"))?;
    render_scoreboard(out, summary, theme)?;
    execute!(out, ResetColor)?;
    Ok(())
}

fn render_grid<W: Write>(out: &mut W, puzzle: &Grid, theme: &Theme) -> io::Result<()> {
    // +===+===+===+ ...
    // | 5 | 3 | . | ...
    execute!(out, SetForegroundColor(theme.box_border), Print(THICK), Print("\n"))?;

    for row in 0..SIDE {
        for col in 0..SIDE {
            let border = if col % REGION_SIDE == 0 {
                theme.box_border
            } else {
                theme.border
            };
            execute!(out, SetForegroundColor(border), Print("|"))?;
            render_cell(out, puzzle, Position::new(row, col), theme)?;
        }
        execute!(out, SetForegroundColor(theme.box_border), Print("|\n"))?;

        let (color, line) = if (row + 1) % REGION_SIDE == 0 {
            (theme.box_border, THICK)
        } else {
            (theme.border, THIN)
        };
        execute!(out, SetForegroundColor(color), Print(line), Print("\n"))?;
    }
    Ok(())
}

fn render_cell<W: Write>(out: &mut W, puzzle: &Grid, pos: Position, theme: &Theme) -> io::Result<()> {
    let value = puzzle.value(pos);
    if value == EMPTY {
        return execute!(out, SetForegroundColor(theme.empty), Print(" . "));
    }
    let color = if puzzle.is_fixed(pos) {
        theme.given
    } else {
        theme.solved
    };
    execute!(out, SetForegroundColor(color), Print(format!(" {value} ")))
}

fn render_scoreboard<W: Write>(out: &mut W, summary: &Summary, theme: &Theme) -> io::Result<()> {
    execute!(
        out,
        SetForegroundColor(theme.info),
        Print(format!(
            "{:>4}  {:<24} {:>6} {:>8} {:>7} {:>6}\n",
            "#", "player", "score", "correct", "beaten", "wrong"
        )),
    )?;

    for (rank, (nickname, score)) in summary.scores.iter().enumerate() {
        let tally = summary
            .tallies
            .iter()
            .find(|t| nickname.as_str() == t.nickname)
            .cloned()
            .unwrap_or_default();
        let score_color = if *score < 0 { theme.error } else { theme.success };
        execute!(
            out,
            SetForegroundColor(theme.info),
            Print(format!("{:>4}  ", rank + 1)),
            SetForegroundColor(theme.key),
            Print(format!("{:<24} ", nickname.as_str())),
            SetForegroundColor(score_color),
            Print(format!("{score:>6} ")),
            SetForegroundColor(theme.fg),
            Print(format!(
                "{:>8} {:>7} {:>6}\n",
                tally.correct, tally.beaten, tally.wrong
            )),
        )?;
    }

    let empty = summary.puzzle.empty_count();
    let (color, note) = if empty == 0 {
        (theme.success, "board complete".to_string())
    } else {
        (theme.info, format!("{empty} cells left open"))
    };
    execute!(out, Print("\n"), SetForegroundColor(color), Print(note), Print("\n"))?;

    if let Some(entry) = &summary.listing {
        execute!(
            out,
            SetForegroundColor(theme.info),
            Print(format!(
                "listed: {} owned by {}, {} players\n",
                entry.name, entry.owner, entry.players
            )),
        )?;
    }
    Ok(())
}
