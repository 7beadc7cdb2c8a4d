//! Decodes the line-oriented text form of the logger's inputs: the four
//! session commands, direct stimulus selection, clicks, and clock advances
//! for scripted runs.
//!
//! ```text
//! start
//! wait 5
//! click 750,250
//! click 30,10@40x20
//! stop
//! export
//! next
//! select 3
//! ```
//!
//! Anything after a `#` is a comment. A click without `@WxH` is in the pixel
//! space of the base grid image.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, space0, space1},
    combinator::{all_consuming, map, map_opt, map_res, opt, value},
    error::Error,
    number::complete::double,
    sequence::{delimited, preceded, separated_pair, terminated, tuple},
    Finish, IResult,
};

use std::{str::FromStr, time::Duration};

/// One decoded input line.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    /// Start logging
    Start,
    /// Stop logging
    Stop,
    /// Clear the log
    Reset,
    /// Advance to the next stimulus
    Next,
    /// Write the exports of the current stimulus
    Export,
    /// Load a stimulus by zero-based listing index
    Select(usize),
    /// Advance the clock
    Wait(Duration),
    /// A click, optionally on a surface of the given width and height
    Click {
        /// Horizontal pixel coordinate
        x: f64,
        /// Vertical pixel coordinate
        y: f64,
        /// Width and height of the clicked surface, if not the base image
        surface: Option<(f64, f64)>,
    },
}

fn parse_keyword(s: &str) -> IResult<&str, ScriptCommand> {
    alt((
        value(ScriptCommand::Start, tag("start")),
        value(ScriptCommand::Stop, tag("stop")),
        value(ScriptCommand::Reset, tag("reset")),
        value(ScriptCommand::Next, tag("next")),
        value(ScriptCommand::Export, tag("export")),
    ))(s)
}

fn parse_select(s: &str) -> IResult<&str, ScriptCommand> {
    map_opt(
        preceded(tuple((tag("select"), space1)), map_res(digit1, usize::from_str)),
        |n: usize| n.checked_sub(1).map(ScriptCommand::Select),
    )(s)
}

fn parse_wait(s: &str) -> IResult<&str, ScriptCommand> {
    map_opt(preceded(tuple((tag("wait"), space1)), double), |secs: f64| {
        Duration::try_from_secs_f64(secs)
            .ok()
            .map(ScriptCommand::Wait)
    })(s)
}

fn parse_surface(s: &str) -> IResult<&str, (f64, f64)> {
    preceded(char('@'), separated_pair(double, char('x'), double))(s)
}

fn parse_click(s: &str) -> IResult<&str, ScriptCommand> {
    map(
        preceded(
            tuple((tag("click"), space1)),
            tuple((
                separated_pair(double, delimited(space0, char(','), space0), double),
                opt(parse_surface),
            )),
        ),
        |((x, y), surface)| ScriptCommand::Click { x, y, surface },
    )(s)
}

fn parse_command(s: &str) -> IResult<&str, ScriptCommand> {
    all_consuming(terminated(
        alt((parse_select, parse_wait, parse_click, parse_keyword)),
        space0,
    ))(s)
}

impl FromStr for ScriptCommand {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_command(s.trim()).finish() {
            Ok((_remaining, command)) => Ok(command),
            Err(Error { input, code }) => Err(Error {
                input: input.to_string(),
                code,
            }),
        }
    }
}

/// Strips comments and surrounding blanks, returning `None` for lines with
/// nothing left.
pub fn meaningful(line: &str) -> Option<&str> {
    let text = line.split('#').next().unwrap_or("").trim();
    (!text.is_empty()).then_some(text)
}
