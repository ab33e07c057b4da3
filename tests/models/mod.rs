mod task_set;
