use std::{io::stdout, time::Duration};

use crate::{gui::error::LoggerGuiError, stimulus::Stimulus};

use crossterm::{
    event::{self, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};

/// Shows the stimuli and lets the participant pick one. Returns the index
/// of the chosen stimulus, or `None` if they quit.
pub fn stimulus_selector(stimuli: &[Stimulus]) -> Result<Option<usize>, LoggerGuiError> {
    if stimuli.is_empty() {
        return Ok(None);
    }

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let res = select_loop(stimuli);
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    res
}

fn entry(stimulus: &Stimulus) -> String {
    match stimulus.duration {
        Some(d) => format!("{}  ({}s)  {}", stimulus.id, d.as_secs(), stimulus.location),
        None => format!("{}  {}", stimulus.id, stimulus.location),
    }
}

fn select_loop(stimuli: &[Stimulus]) -> Result<Option<usize>, LoggerGuiError> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut cursor = 0;
    let mut list_state = ListState::default().with_selected(Some(cursor));
    let n_stimuli = stimuli.len();
    loop {
        let title = Title::from(" Select a Song ".magenta().bold());
        let instructions = Title::from(Line::from(vec![
            " Navigate ".into(),
            "<Up>/<Down>".magenta().bold(),
            " Select ".into(),
            "<Enter>".magenta().bold(),
            " Quit ".into(),
            "<Q> ".magenta().bold(),
        ]));
        let block = Block::default()
            .title(title.alignment(Alignment::Center))
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            )
            .borders(Borders::ALL);
        let list = List::new(stimuli.iter().map(entry))
            .style(Style::default().fg(Color::White))
            .highlight_symbol(">>")
            .highlight_style(Style::default().fg(Color::Magenta))
            .block(block);
        list_state.select(Some(cursor));
        terminal.draw(|frame| {
            let area = frame.size();
            frame.render_stateful_widget(list, area, &mut list_state);
        })?;
        if event::poll(Duration::from_millis(16))? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Down => {
                            cursor = (cursor + 1) % n_stimuli;
                        }
                        KeyCode::Up => {
                            cursor = (cursor + n_stimuli - 1) % n_stimuli;
                        }
                        KeyCode::Enter => return Ok(Some(cursor)),
                        KeyCode::Char('q') => return Ok(None),
                        _ => {}
                    }
                }
            }
        }
    }
}
