//! Console output: COM1 on bare metal, stdout on a host.

#[cfg(target_os = "none")]
mod port {
    use lazy_static::lazy_static;
    use spin::Mutex;
    use uart_16550::SerialPort;

    lazy_static! {
        pub static ref SERIAL1: Mutex<SerialPort> = {
            let mut serial_port = unsafe { SerialPort::new(0x3F8) };
            serial_port.init();
            Mutex::new(serial_port)
        };
    }

    pub fn write(args: core::fmt::Arguments) {
        use core::fmt::Write;
        // The timer and keyboard handlers print too; holding the port lock
        // with interrupts enabled could deadlock against them.
        x86_64::instructions::interrupts::without_interrupts(|| {
            // A failed write has nowhere to be reported.
            let _ = SERIAL1.lock().write_fmt(args);
        });
    }
}

/// Bring up the serial port before the first line is printed.
#[cfg(target_os = "none")]
pub fn init() {
    let _ = port::SERIAL1.lock();
}

#[doc(hidden)]
pub fn _print(args: core::fmt::Arguments) {
    #[cfg(target_os = "none")]
    port::write(args);

    #[cfg(not(target_os = "none"))]
    std::print!("{}", args);
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::serial::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}
