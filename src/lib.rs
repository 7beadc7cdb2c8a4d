//! EmoLogger records how a listener feels while hearing a piece of music.
//! The listener is shown an arousal–valence grid and clicks on it whenever
//! their feeling changes; each click becomes a timestamped sample placed in
//! one of four emotion quadrants. When the piece is over the samples of that
//! stimulus are exported as a table and as an image of the grid with every
//! click marked on it.
//!
//! The pieces, bottom up:
//!
//! - [affect_mapper] turns a click into a (valence, arousal) point and a
//!   [Quadrant](affect_mapper::Quadrant).
//! - [sample_store] keeps the ordered samples of the current stimulus.
//! - [stimulus] says where the stimuli come from and in which order they
//!   are drawn.
//! - [session] and [session_controller] hold the session state machine.
//! - [export] writes the table and the marked-up grid image.
//! - [config], [args], [input_event_decoder], [replay] and [gui] are the
//!   outer surfaces used by the `emologger` binary.

#![warn(missing_docs)]
pub mod affect_mapper;
pub mod args;
pub mod config;
pub mod export;
pub mod gui;
pub mod input_event_decoder;
pub mod replay;
pub mod sample_store;
pub mod session;
pub mod session_controller;
pub mod stimulus;
