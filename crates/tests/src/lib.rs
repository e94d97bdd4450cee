pub mod fixtures;

#[cfg(test)]
mod board_tests;
#[cfg(test)]
mod negotiation_tests;
#[cfg(test)]
mod notification_tests;
#[cfg(test)]
mod ws_tests;
