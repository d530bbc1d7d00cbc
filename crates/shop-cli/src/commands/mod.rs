//! Command implementations for shop-cli

pub mod boot;
pub mod extensions;
pub mod menu;

pub use boot::run_boot;
pub use extensions::{
    run_activate, run_configure, run_deactivate, run_install, run_list, run_purge, run_uninstall,
};
pub use menu::run_menu_list;
