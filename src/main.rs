//! Demo kernel: boots the scheduler with an idle task, a periodic timer task
//! and a short-lived worker, then echoes keyboard input.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod boot {
    use core::panic::PanicInfo;

    use bootloader_api::config::{BootloaderConfig, Mapping};
    use bootloader_api::{entry_point, BootInfo};

    use taskcore::config::{ms_to_ticks, Config};
    use taskcore::message::MessageKind;
    use taskcore::{arch, kernel, memory, println, serial, Kernel};

    pub static BOOTLOADER_CONFIG: BootloaderConfig = {
        let mut config = BootloaderConfig::new_default();
        config.mappings.physical_memory = Some(Mapping::Dynamic);
        config
    };

    entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

    fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
        serial::init();

        println!("taskcore v0.1.0");
        println!("===============");

        if let Err(e) = memory::init(boot_info) {
            panic!("memory init failed: {:?}", e);
        }

        let kernel = kernel::install(Kernel::new(Config::default(), &arch::CPU));
        let me = kernel.current_task();
        kernel.set_input_focus(Some(me));

        let spawned = kernel
            .spawn(idle, 0, Some(0))
            .and_then(|_| kernel.spawn(blink, 500, Some(2)))
            .and_then(|_| kernel.spawn(worker, 1000, None));
        let worker_id = match spawned {
            Ok(id) => id,
            Err(e) => panic!("spawning demo tasks failed: {}", e),
        };

        arch::init();
        arch::enable_interrupts();
        println!("[OK] Interrupts enabled");

        match kernel.wait_finish(worker_id) {
            Ok(code) => println!("[SCHED] worker {} exited with {}", worker_id, code),
            Err(e) => println!("[SCHED] wait for {} failed: {}", worker_id, e),
        }

        loop {
            let msg = kernel.receive_message_blocking();
            if let MessageKind::KeyPush {
                ascii, press: true, ..
            } = msg.kind
            {
                if ascii != 0 {
                    taskcore::print!("{}", ascii as char);
                }
            }
        }
    }

    extern "C" fn idle(_task_id: u64, _data: u64) -> i32 {
        loop {
            arch::halt();
        }
    }

    /// Prints a dot every `data` milliseconds.
    extern "C" fn blink(task_id: u64, data: u64) -> i32 {
        let kernel = kernel::get();
        let me = taskcore::TaskId::from(task_id);
        let period = ms_to_ticks(data).max(1);
        kernel.add_timer_after(period, 1, me, "blink");
        loop {
            let msg = kernel.receive_message_blocking();
            if let MessageKind::TimerTimeout { value, .. } = msg.kind {
                taskcore::print!(".");
                kernel.add_timer_after(period, value.wrapping_add(1), me, "blink");
            }
        }
    }

    /// Sums `1..=data` and exits with the low bits of the result.
    extern "C" fn worker(_task_id: u64, data: u64) -> i32 {
        let sum: u64 = (1..=data).sum();
        (sum & 0x7fff_ffff) as i32
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        arch::disable_interrupts();
        println!("\n!!! KERNEL PANIC !!!");
        println!("{}", info);
        loop {
            arch::halt();
        }
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    println!("taskcore is a bare-metal kernel; build it for x86_64-unknown-none");
}
