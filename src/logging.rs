//! `log` backend for the browser: forwards records to the devtools console.
//!
//! Native builds (and tests) never install a logger, so records are dropped.

#[cfg(target_arch = "wasm32")]
mod console {
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use wasm_bindgen::prelude::*;

    #[wasm_bindgen]
    extern "C" {
        #[wasm_bindgen(js_namespace = console, js_name = debug)]
        fn console_debug(s: &str);
        #[wasm_bindgen(js_namespace = console, js_name = log)]
        fn console_log(s: &str);
        #[wasm_bindgen(js_namespace = console, js_name = warn)]
        fn console_warn(s: &str);
        #[wasm_bindgen(js_namespace = console, js_name = error)]
        fn console_error(s: &str);
    }

    struct ConsoleLogger;

    static LOGGER: ConsoleLogger = ConsoleLogger;

    impl Log for ConsoleLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if !self.enabled(record.metadata()) {
                return;
            }
            let line = format!("[tally] {}", record.args());
            match record.level() {
                Level::Error => console_error(&line),
                Level::Warn => console_warn(&line),
                Level::Info => console_log(&line),
                Level::Debug | Level::Trace => console_debug(&line),
            }
        }

        fn flush(&self) {}
    }

    pub fn init(level: LevelFilter) {
        // A second call (module re-instantiated) keeps the first logger
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level);
        }
    }
}

/// Install the console logger. No-op outside the browser.
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console::init(if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
}
