mod common;
mod ranking;
mod routing;
