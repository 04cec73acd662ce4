use std::time::Instant;

/// Banner-style progress output for long scenario tests.
pub struct TestLogger {
    test_name: String,
    start_time: Instant,
}

impl TestLogger {
    pub fn new(test_name: &str) -> Self {
        let separator = "=".repeat(60);
        println!("\n{}", separator);
        println!("[TEST START] {}", test_name);
        println!("{}", separator);
        Self {
            test_name: test_name.to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn step(&self, message: &str) {
        println!("[STEP] {}: {}", self.test_name, message);
    }

    pub fn log_actual<T: std::fmt::Debug>(&self, name: &str, value: &T) {
        println!("[ACTUAL] {}: {:?}", name, value);
    }

    pub fn pass(&self) {
        let elapsed = self.start_time.elapsed();
        println!("[RESULT] {} PASSED in {:?}", self.test_name, elapsed);
        println!("{}\n", "=".repeat(60));
    }
}
