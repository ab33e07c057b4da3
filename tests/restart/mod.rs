mod lane_cascade;
