mod test_dispatch;
mod test_registry;
mod test_worker;
